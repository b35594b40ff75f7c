use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::entity::Entity;
use crate::error::SceneResult;
use crate::scene::Scene;
use crate::serializer::{self, IdentityMode};

/// Text clipboard used for copy and paste of entity subtrees.
pub trait Clipboard {
    fn text(&self) -> Option<String>;

    fn set_text(&mut self, text: String);
}

/// In-process clipboard. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn text(&self) -> Option<String> {
        self.contents.lock().clone()
    }

    fn set_text(&mut self, text: String) {
        *self.contents.lock() = Some(text);
    }
}

/// Places `entity` and its subtree on the clipboard as an `<Entity>` document.
pub fn copy_entity(scene: &Scene, entity: Entity, clipboard: &mut dyn Clipboard) -> SceneResult<()> {
    let text = serializer::entity_to_text(scene.registry(), entity)?;
    clipboard.set_text(text);
    Ok(())
}

/// Creates the clipboard subtree under `parent`, or at the root level.
///
/// Returns `Ok(None)` when the clipboard is empty. The pasted entities get
/// fresh persistent ids.
pub fn paste(
    scene: &mut Scene,
    parent: Option<Entity>,
    clipboard: &dyn Clipboard,
) -> SceneResult<Option<Entity>> {
    let Some(text) = clipboard.text() else {
        debug!("paste with an empty clipboard");
        return Ok(None);
    };
    let blueprint = serializer::blueprint_from_text(&text)?;
    scene
        .instantiate(blueprint, parent, IdentityMode::Regenerate)
        .map(Some)
}

/// Copies the subtree, then removes it from the scene.
pub fn cut(scene: &mut Scene, entity: Entity, clipboard: &mut dyn Clipboard) -> SceneResult<usize> {
    copy_entity(scene, entity, clipboard)?;
    scene.remove_entity(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{IdComponent, TransformComponent};
    use crate::error::SceneError;
    use crate::scene_graph;
    use glam::Vec3;

    #[test]
    fn copy_then_paste_creates_an_independent_subtree() {
        let mut scene = Scene::new("Clipboard");
        let a = scene.create_entity("A");
        let b = scene.create_child("B", a).unwrap();
        scene
            .edit::<TransformComponent, _>(b, |transform| transform.position = Vec3::X)
            .unwrap();

        let mut clipboard = MemoryClipboard::new();
        copy_entity(&scene, a, &mut clipboard).unwrap();
        let text = clipboard.text().unwrap();
        assert!(text.contains("<Entity"));

        scene.save_to(std::io::sink()).unwrap();
        let pasted = paste(&mut scene, None, &clipboard).unwrap().unwrap();
        assert!(scene.is_dirty());
        assert_eq!(scene.entities().count(), 4);
        assert_ne!(pasted, a);
        assert_eq!(scene.name_of(pasted), Some("A"));
        assert!(scene_graph::is_root(scene.registry(), pasted));

        let pasted_child = scene_graph::first_child(scene.registry(), pasted).unwrap();
        assert_eq!(scene.name_of(pasted_child), Some("B"));
        assert_ne!(pasted_child, b);
        assert_ne!(
            scene.get::<IdComponent>(pasted_child),
            scene.get::<IdComponent>(b)
        );
        assert_eq!(
            scene.get::<TransformComponent>(pasted_child).unwrap().position,
            Vec3::X
        );

        // The original is untouched.
        assert_eq!(scene_graph::children(scene.registry(), a).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn paste_under_a_parent() {
        let mut scene = Scene::new("Nested");
        let source = scene.create_entity("Source");
        let target = scene.create_entity("Target");
        let mut clipboard = MemoryClipboard::new();
        copy_entity(&scene, source, &mut clipboard).unwrap();
        let pasted = paste(&mut scene, Some(target), &clipboard).unwrap().unwrap();
        assert_eq!(scene_graph::parent(scene.registry(), pasted), Some(target));
    }

    #[test]
    fn empty_clipboard_pastes_nothing() {
        let mut scene = Scene::new("Empty");
        let clipboard = MemoryClipboard::new();
        assert_eq!(paste(&mut scene, None, &clipboard).unwrap(), None);
        assert!(!scene.is_dirty());
    }

    #[test]
    fn malformed_clipboard_leaves_scene_untouched() {
        let mut scene = Scene::new("Malformed");
        let mut clipboard = MemoryClipboard::new();
        clipboard.set_text("<Entity><Transform><Scale>1 1</Scale></Transform></Entity>".into());
        assert!(matches!(
            paste(&mut scene, None, &clipboard),
            Err(SceneError::InvalidValue { .. })
        ));
        assert!(scene.registry().is_empty());
        assert!(!scene.is_dirty());
    }

    #[test]
    fn cut_removes_the_source() {
        let mut scene = Scene::new("Cut");
        let a = scene.create_entity("A");
        scene.create_child("B", a).unwrap();
        let mut clipboard = MemoryClipboard::new();
        assert_eq!(cut(&mut scene, a, &mut clipboard).unwrap(), 2);
        assert!(scene.registry().is_empty());

        let shared = clipboard.clone();
        let pasted = paste(&mut scene, None, &shared).unwrap().unwrap();
        assert_eq!(scene.name_of(pasted), Some("A"));
        assert_eq!(scene.entities().count(), 2);
    }
}
