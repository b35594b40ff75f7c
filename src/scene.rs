use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::components::{CameraComponent, IdComponent, NameComponent, TransformComponent};
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::{Component, Registry};
use crate::scene_graph;
use crate::serializer::{self, Blueprint, IdentityMode};

/// Scene-wide settings stored in the scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    pub name: String,
    #[serde(default = "default_gravity")]
    pub gravity: Vec2,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            gravity: default_gravity(),
        }
    }
}

fn default_gravity() -> Vec2 {
    Vec2::new(0.0, -9.81)
}

/// Notifications drained by the host after each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Loaded(PathBuf),
    Saved(PathBuf),
    Changed,
}

impl fmt::Display for SceneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(path) => write!(f, "Scene loaded from: {}", path.display()),
            Self::Saved(path) => write!(f, "Scene saved to: {}", path.display()),
            Self::Changed => f.write_str("Scene changed"),
        }
    }
}

/// A set of entities with their hierarchy, settings and save state.
///
/// Every mutating method marks the scene dirty; saving successfully marks
/// it clean again.
#[derive(Debug)]
pub struct Scene {
    registry: Registry,
    settings: SceneSettings,
    dirty: bool,
    next_id: u64,
    /// Persistent ids handed out or loaded. Ids removed later may linger.
    ids: HashSet<u64>,
    path: Option<PathBuf>,
    events: Vec<SceneEvent>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::with_settings(SceneSettings::default())
    }
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(SceneSettings {
            name: name.into(),
            ..SceneSettings::default()
        })
    }

    pub fn with_settings(settings: SceneSettings) -> Self {
        Self {
            registry: Registry::new(),
            settings,
            dirty: false,
            next_id: 1,
            ids: HashSet::new(),
            path: None,
            events: Vec::new(),
        }
    }

    /// Parses a scene document. The result is clean and has no path.
    pub fn from_xml(xml: &str) -> SceneResult<Self> {
        serializer::deserialize_scene(xml)
    }

    pub fn to_xml(&self) -> SceneResult<String> {
        Ok(serializer::serialize_scene(self)?.to_document())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        let mut scene = Self::from_xml(&xml)
            .with_context(|| format!("failed to parse scene {}", path.display()))?;
        scene.path = Some(path.to_path_buf());
        scene.events.push(SceneEvent::Loaded(path.to_path_buf()));
        info!("loaded {} entities from {}", scene.registry.len(), path.display());
        Ok(scene)
    }

    /// Saves to the path the scene was loaded from or last saved to.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| anyhow!("scene `{}` has no file path", self.settings.name))?;
        self.save_as(path)
    }

    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let xml = self.to_xml().context("failed to serialize scene")?;
        fs::write(path, xml).with_context(|| format!("failed to write {}", path.display()))?;
        self.dirty = false;
        self.path = Some(path.to_path_buf());
        self.events.push(SceneEvent::Saved(path.to_path_buf()));
        info!("saved scene to {}", path.display());
        Ok(())
    }

    /// Writes the scene document to `writer`; the scene is clean only if
    /// the whole document was written.
    pub fn save_to<W: Write>(&mut self, mut writer: W) -> SceneResult<()> {
        let xml = self.to_xml()?;
        writer.write_all(xml.as_bytes())?;
        writer.flush()?;
        self.dirty = false;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct registry access. Changes made through it are not tracked,
    /// including persistent ids attached here.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.settings.name = name.into();
        self.mark_dirty();
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.settings.gravity = gravity;
        self.mark_dirty();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        if !self.dirty {
            self.dirty = true;
            self.events.push(SceneEvent::Changed);
        }
    }

    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Creates a root entity with a name, a persistent id and a transform.
    pub fn create_entity(&mut self, name: impl Into<String>) -> Entity {
        let id = self.allocate_id();
        let entity = self
            .registry
            .build()
            .with(NameComponent::new(name))
            .with(IdComponent(id))
            .with(TransformComponent::default())
            .entity();
        self.mark_dirty();
        entity
    }

    pub fn create_child(&mut self, name: impl Into<String>, parent: Entity) -> SceneResult<Entity> {
        if !self.registry.contains(parent) {
            return Err(SceneError::InvalidEntity(parent));
        }
        let entity = self.create_entity(name);
        scene_graph::reparent(&mut self.registry, entity, Some(parent))?;
        Ok(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.registry.contains(entity)
    }

    pub fn name_of(&self, entity: Entity) -> Option<&str> {
        self.registry
            .get::<NameComponent>(entity)
            .map(|name| name.name.as_str())
    }

    pub fn set_entity_name(&mut self, entity: Entity, name: impl Into<String>) -> SceneResult<()> {
        self.insert(entity, NameComponent::new(name)).map(|_| ())
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.registry.get(entity)
    }

    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> SceneResult<Option<T>> {
        if let Some(id) = (&component as &dyn Any).downcast_ref::<IdComponent>() {
            self.ids.insert(id.0);
        }
        let previous = self.registry.insert(entity, component)?;
        self.mark_dirty();
        Ok(previous)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = self.registry.remove::<T>(entity)?;
        self.mark_dirty();
        Some(removed)
    }

    /// Runs `edit` on the entity's `T`, if it has one.
    pub fn edit<T: Component, R>(&mut self, entity: Entity, edit: impl FnOnce(&mut T) -> R) -> Option<R> {
        let result = edit(self.registry.get_mut::<T>(entity)?);
        self.mark_dirty();
        Some(result)
    }

    /// Moves `child` under `parent`, or to the root level for `None`.
    pub fn reparent(&mut self, child: Entity, parent: Option<Entity>) -> SceneResult<bool> {
        let changed = scene_graph::reparent(&mut self.registry, child, parent)?;
        if changed {
            self.mark_dirty();
        }
        Ok(changed)
    }

    pub fn unparent(&mut self, child: Entity) -> SceneResult<bool> {
        self.reparent(child, None)
    }

    /// Destroys the entity and its whole subtree, returning how many
    /// entities were removed.
    pub fn remove_entity(&mut self, entity: Entity) -> SceneResult<usize> {
        let removed = scene_graph::destroy(&mut self.registry, entity)?;
        self.mark_dirty();
        Ok(removed)
    }

    /// Copies the subtree rooted at `entity` under `parent` with fresh ids.
    pub fn duplicate_entity(&mut self, entity: Entity, parent: Option<Entity>) -> SceneResult<Entity> {
        let blueprint = Blueprint::capture(&self.registry, entity)?;
        self.instantiate(blueprint, parent, IdentityMode::Regenerate)
    }

    /// Creates the entities described by `blueprint` under `parent`.
    pub fn instantiate(
        &mut self,
        blueprint: Blueprint,
        parent: Option<Entity>,
        identity: IdentityMode,
    ) -> SceneResult<Entity> {
        let entity = self.spawn(blueprint, parent, identity)?;
        self.mark_dirty();
        Ok(entity)
    }

    /// Instantiates without touching the dirty flag. Used while loading.
    pub(crate) fn spawn(
        &mut self,
        blueprint: Blueprint,
        parent: Option<Entity>,
        identity: IdentityMode,
    ) -> SceneResult<Entity> {
        if let Some(parent) = parent {
            if !self.registry.contains(parent) {
                return Err(SceneError::InvalidEntity(parent));
            }
        }
        let mut spawned = Vec::with_capacity(blueprint.nodes.len());
        let mut links = Vec::with_capacity(blueprint.nodes.len());
        for node in blueprint.nodes {
            let entity = self.registry.create();
            let id = match (identity, node.id) {
                (IdentityMode::Preserve, Some(id)) if !self.ids.contains(&id) => {
                    self.ids.insert(id);
                    if let Some(next) = id.checked_add(1) {
                        self.next_id = self.next_id.max(next);
                    }
                    id
                }
                (IdentityMode::Preserve, Some(id)) => {
                    let fresh = self.allocate_id();
                    warn!("entity id {id} is already in use, assigned {fresh}");
                    fresh
                }
                _ => self.allocate_id(),
            };
            self.registry.insert(entity, IdComponent(id))?;
            for component in node.components {
                component.attach(&mut self.registry, entity)?;
            }
            spawned.push(entity);
            links.push(node.parent);
        }
        // Children are prepended, so link them last to first.
        for (index, link) in links.iter().enumerate().rev() {
            let target = match link {
                Some(owner) => Some(spawned[*owner]),
                None => parent,
            };
            if target.is_some() {
                scene_graph::reparent(&mut self.registry, spawned[index], target)?;
            }
        }
        spawned.first().copied().ok_or(SceneError::MissingField {
            element: "Blueprint",
            field: serializer::ENTITY_ELEMENT,
        })
    }

    /// Next free persistent id. Wraps to the bottom of the id space instead
    /// of overflowing.
    fn allocate_id(&mut self) -> u64 {
        loop {
            let candidate = self.next_id;
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if self.ids.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.registry.iter()
    }

    /// Entities without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = Entity> + '_ {
        self.registry
            .iter()
            .filter(|entity| scene_graph::is_root(&self.registry, *entity))
    }

    /// Resolves a slash separated name path such as `Player/Camera`.
    pub fn find_entity_by_path(&self, path: &str) -> Option<Entity> {
        let mut found = None;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            let named = |entity: &Entity| self.name_of(*entity) == Some(segment);
            found = Some(match found {
                None => self.roots().find(named)?,
                Some(parent) => scene_graph::children(&self.registry, parent).find(named)?,
            });
        }
        found
    }

    pub fn primary_camera(&self) -> Option<Entity> {
        self.entities().find(|entity| {
            self.registry
                .get::<CameraComponent>(*entity)
                .is_some_and(|camera| camera.primary)
        })
    }
}
