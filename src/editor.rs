//! View model behind the hierarchy panel: selection, filtering, clipboard
//! actions and drag-and-drop.

use std::fmt;

use log::{debug, info};

use crate::clipboard::{self, Clipboard, MemoryClipboard};
use crate::commands::{CommandQueue, SceneCommand};
use crate::components::{
    CameraComponent, PointLightComponent, PrimitiveComponent, PrimitiveShape, SpriteComponent,
};
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::scene::Scene;
use crate::scene_graph;

/// Name filter using the `"include,-exclude"` syntax of the panel's
/// search box. Matching is a case-insensitive substring test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl NameFilter {
    pub fn parse(pattern: &str) -> Self {
        let mut filter = Self::default();
        for term in pattern.split(',').map(str::trim) {
            match term.strip_prefix('-') {
                Some(excluded) if !excluded.trim().is_empty() => {
                    filter.exclude.push(excluded.trim().to_lowercase());
                }
                Some(_) => {}
                None if !term.is_empty() => filter.include.push(term.to_lowercase()),
                None => {}
            }
        }
        filter
    }

    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn passes(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.exclude.iter().any(|term| name.contains(term.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|term| name.contains(term.as_str()))
    }
}

/// One visible line of the hierarchy panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub entity: Entity,
    pub depth: usize,
    pub name: String,
    pub has_children: bool,
}

/// Entries of the panel's create menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityPreset {
    Empty,
    Primitive(PrimitiveShape),
    Sprite,
    PointLight,
    Camera,
}

impl EntityPreset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Entity",
            Self::Primitive(shape) => shape.name(),
            Self::Sprite => "Sprite",
            Self::PointLight => "Point Light",
            Self::Camera => "Camera",
        }
    }
}

pub struct HierarchyEditor {
    selection: Option<Entity>,
    filter: NameFilter,
    clipboard: Box<dyn Clipboard>,
    commands: CommandQueue,
}

impl fmt::Debug for HierarchyEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyEditor")
            .field("selection", &self.selection)
            .field("filter", &self.filter)
            .field("pending_commands", &self.commands.len())
            .finish()
    }
}

impl Default for HierarchyEditor {
    fn default() -> Self {
        Self::new(MemoryClipboard::new())
    }
}

impl HierarchyEditor {
    pub fn new(clipboard: impl Clipboard + 'static) -> Self {
        Self {
            selection: None,
            filter: NameFilter::default(),
            clipboard: Box::new(clipboard),
            commands: CommandQueue::new(),
        }
    }

    pub fn selection(&self) -> Option<Entity> {
        self.selection
    }

    pub fn select(&mut self, entity: Option<Entity>) {
        self.selection = entity;
    }

    /// Drops the selection if it no longer belongs to `scene`.
    pub fn sync_selection(&mut self, scene: &Scene) {
        if self.selection.is_some_and(|entity| !scene.contains(entity)) {
            debug!("clearing stale selection");
            self.selection = None;
        }
    }

    fn selected(&self, scene: &Scene) -> Option<Entity> {
        self.selection.filter(|entity| scene.contains(*entity))
    }

    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, pattern: &str) {
        self.filter = NameFilter::parse(pattern);
    }

    /// Copies the selected subtree. Returns false when nothing is selected.
    pub fn copy(&mut self, scene: &Scene) -> SceneResult<bool> {
        let Some(entity) = self.selected(scene) else {
            return Ok(false);
        };
        clipboard::copy_entity(scene, entity, self.clipboard.as_mut())?;
        Ok(true)
    }

    pub fn cut(&mut self, scene: &mut Scene) -> SceneResult<bool> {
        let Some(entity) = self.selected(scene) else {
            return Ok(false);
        };
        clipboard::cut(scene, entity, self.clipboard.as_mut())?;
        self.selection = None;
        Ok(true)
    }

    /// Pastes the clipboard under `parent` and selects the result.
    pub fn paste(&mut self, scene: &mut Scene, parent: Option<Entity>) -> SceneResult<Option<Entity>> {
        let pasted = clipboard::paste(scene, parent, self.clipboard.as_ref())?;
        if pasted.is_some() {
            self.selection = pasted;
        }
        Ok(pasted)
    }

    /// Duplicates the selected subtree at the root level and selects the copy.
    pub fn duplicate(&mut self, scene: &mut Scene) -> SceneResult<Option<Entity>> {
        let Some(entity) = self.selected(scene) else {
            return Ok(None);
        };
        let copy = scene.duplicate_entity(entity, None)?;
        self.selection = Some(copy);
        Ok(Some(copy))
    }

    /// Deletes the selected entity and its subtree.
    pub fn delete(&mut self, scene: &mut Scene) -> SceneResult<usize> {
        let Some(entity) = self.selected(scene) else {
            return Ok(0);
        };
        let removed = scene.remove_entity(entity)?;
        self.selection = None;
        Ok(removed)
    }

    /// Schedules deletion of the selection for the end of the frame.
    pub fn queue_delete(&mut self) {
        if let Some(entity) = self.selection {
            self.commands.push(SceneCommand::Destroy(entity));
        }
    }

    pub fn create(
        &mut self,
        scene: &mut Scene,
        preset: EntityPreset,
        parent: Option<Entity>,
    ) -> SceneResult<Entity> {
        let entity = match parent {
            Some(parent) => scene.create_child(preset.name(), parent)?,
            None => scene.create_entity(preset.name()),
        };
        match preset {
            EntityPreset::Empty => {}
            EntityPreset::Primitive(shape) => {
                scene.insert(entity, PrimitiveComponent { shape })?;
            }
            EntityPreset::Sprite => {
                scene.insert(entity, SpriteComponent::default())?;
            }
            EntityPreset::PointLight => {
                scene.insert(entity, PointLightComponent::default())?;
            }
            EntityPreset::Camera => {
                let primary = scene.primary_camera().is_none();
                scene.insert(
                    entity,
                    CameraComponent {
                        primary,
                        ..CameraComponent::default()
                    },
                )?;
            }
        }
        self.selection = Some(entity);
        Ok(entity)
    }

    /// Creates a primitive by shape name, e.g. `"Sphere"`.
    pub fn create_primitive(&mut self, scene: &mut Scene, shape: &str) -> SceneResult<Entity> {
        let shape = PrimitiveShape::from_name(shape).ok_or_else(|| SceneError::InvalidValue {
            element: "Primitive",
            field: "Shape",
            message: format!("unknown shape `{shape}`"),
        })?;
        self.create(scene, EntityPreset::Primitive(shape), None)
    }

    /// Handles a drop of `dropped` onto `target`, or onto empty space.
    pub fn drop_entity(
        &mut self,
        scene: &mut Scene,
        dropped: Entity,
        target: Option<Entity>,
    ) -> SceneResult<bool> {
        let moved = scene.reparent(dropped, target)?;
        if moved {
            info!("moved {dropped} under {target:?}");
        }
        Ok(moved)
    }

    /// Records a drop made while the tree is being drawn.
    pub fn queue_drop(&self, dropped: Entity, target: Option<Entity>) {
        self.commands.push(SceneCommand::Reparent {
            child: dropped,
            parent: target,
        });
    }

    /// Commits queued edits and returns how many were applied.
    pub fn end_frame(&mut self, scene: &mut Scene) -> usize {
        let applied = self.commands.apply(scene);
        self.sync_selection(scene);
        applied
    }

    /// Rows to draw: the full tree, or a flat list of matches while the
    /// filter is active.
    pub fn rows(&self, scene: &Scene) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if self.filter.is_active() {
            for entity in scene.entities() {
                let name = scene.name_of(entity).unwrap_or_default();
                if self.filter.passes(name) {
                    rows.push(row(scene, entity, 0));
                }
            }
        } else {
            let mut pending: Vec<(Entity, usize)> = scene.roots().map(|root| (root, 0)).collect();
            pending.reverse();
            while let Some((entity, depth)) = pending.pop() {
                rows.push(row(scene, entity, depth));
                let children: Vec<Entity> = scene_graph::children(scene.registry(), entity).collect();
                pending.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
        }
        rows
    }
}

fn row(scene: &Scene, entity: Entity, depth: usize) -> TreeRow {
    TreeRow {
        entity,
        depth,
        name: scene.name_of(entity).unwrap_or_default().to_string(),
        has_children: scene_graph::first_child(scene.registry(), entity).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rows: &[TreeRow]) -> Vec<(String, usize)> {
        rows.iter().map(|row| (row.name.clone(), row.depth)).collect()
    }

    #[test]
    fn filter_syntax() {
        let filter = NameFilter::parse("light, -Point ,");
        assert!(filter.is_active());
        assert!(filter.passes("Spot LIGHT"));
        assert!(!filter.passes("Point Light"));
        assert!(!filter.passes("Camera"));

        let exclude_only = NameFilter::parse("-cam");
        assert!(exclude_only.passes("Cube"));
        assert!(!exclude_only.passes("Main Camera"));
        assert!(!NameFilter::parse(" , -").is_active());
    }

    #[test]
    fn rows_follow_the_hierarchy() {
        let mut scene = Scene::new("Rows");
        let a = scene.create_entity("A");
        scene.create_child("A1", a).unwrap();
        scene.create_entity("B");
        let editor = HierarchyEditor::default();
        let rows = editor.rows(&scene);
        assert_eq!(
            names(&rows),
            vec![("A".into(), 0), ("A1".into(), 1), ("B".into(), 0)]
        );
        assert!(rows[0].has_children);
        assert!(!rows[2].has_children);
    }

    #[test]
    fn rows_cover_deep_hierarchies() {
        let mut scene = Scene::new("Deep");
        let links: Vec<Entity> = (0..10_000)
            .map(|i| scene.create_entity(format!("Link {i}")))
            .collect();
        for pair in links.windows(2) {
            scene.reparent(pair[0], Some(pair[1])).unwrap();
        }
        let rows = HierarchyEditor::default().rows(&scene);
        assert_eq!(rows.len(), links.len());
        assert_eq!(rows[0].entity, links[links.len() - 1]);
        assert_eq!(rows[rows.len() - 1].entity, links[0]);
        assert_eq!(rows[rows.len() - 1].depth, links.len() - 1);
        assert!(!rows[rows.len() - 1].has_children);
    }

    #[test]
    fn active_filter_flattens_rows() {
        let mut scene = Scene::new("Filtered");
        let player = scene.create_entity("Player");
        scene.create_child("Player Camera", player).unwrap();
        scene.create_entity("Light");
        let mut editor = HierarchyEditor::default();
        editor.set_filter("player");
        assert_eq!(
            names(&editor.rows(&scene)),
            vec![("Player".into(), 0), ("Player Camera".into(), 0)]
        );
    }

    #[test]
    fn copy_paste_selects_the_new_entity() {
        let mut scene = Scene::new("Paste");
        let a = scene.create_entity("A");
        scene.create_child("B", a).unwrap();
        let mut editor = HierarchyEditor::default();
        assert!(!editor.copy(&scene).unwrap());

        editor.select(Some(a));
        assert!(editor.copy(&scene).unwrap());
        let pasted = editor.paste(&mut scene, None).unwrap().unwrap();
        assert_eq!(editor.selection(), Some(pasted));
        assert_eq!(scene.entities().count(), 4);
    }

    #[test]
    fn delete_clears_selection_and_removes_subtree() {
        let mut scene = Scene::new("Delete");
        let a = scene.create_entity("A");
        scene.create_child("B", a).unwrap();
        let mut editor = HierarchyEditor::default();
        editor.select(Some(a));
        assert_eq!(editor.delete(&mut scene).unwrap(), 2);
        assert_eq!(editor.selection(), None);
        assert!(scene.registry().is_empty());
    }

    #[test]
    fn dropping_onto_a_descendant_is_rejected() {
        let mut scene = Scene::new("Drop");
        let a = scene.create_entity("A");
        let b = scene.create_child("B", a).unwrap();
        let mut editor = HierarchyEditor::default();
        let before = editor.rows(&scene);
        assert!(matches!(
            editor.drop_entity(&mut scene, a, Some(b)),
            Err(SceneError::Cycle { .. })
        ));
        assert_eq!(editor.rows(&scene), before);

        assert!(editor.drop_entity(&mut scene, b, None).unwrap());
        assert!(scene_graph::is_root(scene.registry(), b));
    }

    #[test]
    fn queued_edits_apply_at_end_of_frame() {
        let mut scene = Scene::new("Deferred");
        let a = scene.create_entity("A");
        let b = scene.create_entity("B");
        let mut editor = HierarchyEditor::default();
        editor.queue_drop(b, Some(a));
        editor.select(Some(a));
        editor.queue_delete();
        assert_eq!(scene.entities().count(), 2);

        assert_eq!(editor.end_frame(&mut scene), 2);
        assert!(scene.registry().is_empty());
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn create_menu_presets() {
        let mut scene = Scene::new("Create");
        let mut editor = HierarchyEditor::default();
        let sphere = editor.create_primitive(&mut scene, "Sphere").unwrap();
        assert_eq!(scene.name_of(sphere), Some("Sphere"));
        assert_eq!(editor.selection(), Some(sphere));
        assert!(editor.create_primitive(&mut scene, "Teapot").is_err());

        let first = editor.create(&mut scene, EntityPreset::Camera, None).unwrap();
        let second = editor
            .create(&mut scene, EntityPreset::Camera, Some(sphere))
            .unwrap();
        assert!(scene.get::<CameraComponent>(first).unwrap().primary);
        assert!(!scene.get::<CameraComponent>(second).unwrap().primary);
        assert_eq!(scene.primary_camera(), Some(first));
    }
}
