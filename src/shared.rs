use std::sync::Arc;

use glam::Vec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::components::TransformComponent;
use crate::entity::Entity;
use crate::scene::Scene;

/// Scene handle shared between the editor, the script host and the CLI.
///
/// Structural edits happen under the write lock, so readers never see a
/// half-patched sibling list.
#[derive(Debug, Default)]
pub struct SharedScene {
    scene: Arc<RwLock<Scene>>,
}

impl Clone for SharedScene {
    fn clone(&self) -> Self {
        Self {
            scene: Arc::clone(&self.scene),
        }
    }
}

impl From<Scene> for SharedScene {
    fn from(scene: Scene) -> Self {
        Self::new(scene)
    }
}

impl SharedScene {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene: Arc::new(RwLock::new(scene)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Scene> {
        self.scene.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Scene> {
        self.scene.write()
    }

    /// Swaps in a new scene, e.g. after loading, and returns the old one.
    pub fn replace(&self, scene: Scene) -> Scene {
        std::mem::replace(&mut *self.scene.write(), scene)
    }

    /// Runs `updater` with the scene locked for writing.
    pub fn update<F, R>(&self, updater: F) -> R
    where
        F: FnOnce(&mut Scene) -> R,
    {
        updater(&mut self.scene.write())
    }

    pub fn name_of(&self, entity: Entity) -> Option<String> {
        self.read().name_of(entity).map(str::to_string)
    }

    pub fn transform(&self, entity: Entity) -> Option<TransformComponent> {
        self.read().get::<TransformComponent>(entity).copied()
    }

    /// Applies a mutation to the entity's transform, adding one if missing.
    pub fn update_transform<F>(&self, entity: Entity, updater: F) -> bool
    where
        F: FnOnce(&mut TransformComponent),
    {
        let mut scene = self.write();
        if !scene.contains(entity) {
            return false;
        }
        if scene.get::<TransformComponent>(entity).is_none() {
            let _ = scene.insert(entity, TransformComponent::default());
        }
        scene.edit(entity, updater).is_some()
    }

    pub fn set_position(&self, entity: Entity, position: Vec3) -> bool {
        self.update_transform(entity, |transform| transform.position = position)
    }

    pub fn set_rotation(&self, entity: Entity, rotation: Vec3) -> bool {
        self.update_transform(entity, |transform| transform.rotation = rotation)
    }

    pub fn set_scale(&self, entity: Entity, scale: Vec3) -> bool {
        self.update_transform(entity, |transform| transform.scale = scale)
    }
}
