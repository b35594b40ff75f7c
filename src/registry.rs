use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::entity::{Entity, RegistryId};
use crate::error::{SceneError, SceneResult};

/// Plain data that can be attached to an entity.
pub trait Component: Any + Send + Sync {}

/// Dense storage for one component type, indexed sparsely by entity slot.
struct SparseSet<T> {
    sparse: Vec<Option<usize>>,
    entities: Vec<Entity>,
    values: Vec<T>,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> SparseSet<T> {
    fn slot(&self, entity: Entity) -> Option<usize> {
        let slot = self.sparse.get(entity.index() as usize).copied().flatten()?;
        (self.entities[slot] == entity).then_some(slot)
    }

    fn get(&self, entity: Entity) -> Option<&T> {
        self.slot(entity).map(|slot| &self.values[slot])
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = self.slot(entity)?;
        Some(&mut self.values[slot])
    }

    fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, None);
        }
        if let Some(slot) = self.sparse[index] {
            self.entities[slot] = entity;
            return Some(std::mem::replace(&mut self.values[slot], value));
        }
        self.sparse[index] = Some(self.values.len());
        self.entities.push(entity);
        self.values.push(value);
        None
    }

    fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slot(entity)?;
        self.sparse[entity.index() as usize] = None;
        self.entities.swap_remove(slot);
        let value = self.values.swap_remove(slot);
        if let Some(moved) = self.entities.get(slot) {
            self.sparse[moved.index() as usize] = Some(slot);
        }
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.values.iter())
    }
}

trait Storage: Send + Sync {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> Storage for SparseSet<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owning store of every entity and component of one scene.
///
/// Components live in one erased sparse set per type, keyed by [`TypeId`].
/// Entities are iterated in creation order.
pub struct Registry {
    id: RegistryId,
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    /// Creation order. Destroyed entities stay here until the next compaction.
    order: Vec<Entity>,
    live: usize,
    storages: HashMap<TypeId, Box<dyn Storage>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("entities", &self.live)
            .field(
                "components",
                &self.storages.values().map(|s| s.len()).sum::<usize>(),
            )
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            id: RegistryId::next(),
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            live: 0,
            storages: HashMap::new(),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Allocates a new entity with no components.
    pub fn create(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.generations.push(0);
                self.alive.push(false);
                (self.generations.len() - 1) as u32
            }
        };
        self.alive[index as usize] = true;
        let entity = Entity::new(index, self.generations[index as usize], self.id);
        self.order.push(entity);
        self.live += 1;
        entity
    }

    /// Allocates a new entity and returns a builder for its components.
    pub fn build(&mut self) -> EntityBuilder<'_> {
        let entity = self.create();
        EntityBuilder {
            registry: self,
            entity,
        }
    }

    /// Returns true if the handle refers to a live entity of this registry.
    pub fn contains(&self, entity: Entity) -> bool {
        is_live(&self.alive, &self.generations, self.id, entity)
    }

    /// Removes the entity and all of its components.
    ///
    /// Hierarchy links held by other entities are not touched; use
    /// [`scene_graph::destroy`](crate::scene_graph::destroy) to keep the
    /// hierarchy consistent.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.contains(entity) {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        let index = entity.index() as usize;
        self.alive[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(entity.index());
        self.live -= 1;
        if self.order.len() > 2 * self.live + 32 {
            let (alive, generations, id) = (&self.alive, &self.generations, self.id);
            self.order.retain(|entity| is_live(alive, generations, id, *entity));
        }
        true
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|entity| self.contains(*entity))
    }

    /// Attaches a component, returning the value it replaced.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> SceneResult<Option<T>> {
        if !self.contains(entity) {
            return Err(SceneError::InvalidEntity(entity));
        }
        Ok(self.storage_mut::<T>().insert(entity, component))
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()?
            .get_mut(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()?
            .remove(entity)
    }

    /// Returns the component, inserting the result of `make` if it is missing.
    pub fn get_or_insert_with<T: Component>(
        &mut self,
        entity: Entity,
        make: impl FnOnce() -> T,
    ) -> SceneResult<&mut T> {
        if !self.contains(entity) {
            return Err(SceneError::InvalidEntity(entity));
        }
        let storage = self.storage_mut::<T>();
        if storage.get(entity).is_none() {
            storage.insert(entity, make());
        }
        storage
            .get_mut(entity)
            .ok_or(SceneError::InvalidEntity(entity))
    }

    /// Iterates every entity holding a `T`, in storage order.
    pub fn view<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.storage::<T>()
            .into_iter()
            .flat_map(|storage| storage.iter())
    }

    fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<SparseSet<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> &mut SparseSet<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::default()))
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .expect("storage registered under its own TypeId")
    }
}

fn is_live(alive: &[bool], generations: &[u32], id: RegistryId, entity: Entity) -> bool {
    let index = entity.index() as usize;
    entity.registry() == id
        && alive.get(index).copied().unwrap_or(false)
        && generations[index] == entity.generation()
}

/// Attaches components to an entity fresh from [`Registry::build`].
pub struct EntityBuilder<'a> {
    registry: &'a mut Registry,
    entity: Entity,
}

impl EntityBuilder<'_> {
    pub fn with<T: Component>(mut self, component: T) -> Self {
        self.registry.storage_mut::<T>().insert(self.entity, component);
        self
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);
    impl Component for Label {}

    #[test]
    fn stale_handles_are_rejected() {
        let mut registry = Registry::new();
        let first = registry.create();
        assert!(registry.destroy(first));
        let second = registry.create();
        assert_eq!(first.index(), second.index());
        assert!(!registry.contains(first));
        assert!(registry.contains(second));
        assert!(matches!(
            registry.insert(first, Health(1)),
            Err(SceneError::InvalidEntity(_))
        ));
    }

    #[test]
    fn handles_from_other_registries_are_not_contained() {
        let mut a = Registry::new();
        let b = Registry::new();
        let entity = a.create();
        assert!(!b.contains(entity));
    }

    #[test]
    fn components_are_stored_per_type() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.insert(entity, Health(10)).unwrap();
        registry.insert(entity, Label("hero")).unwrap();
        assert_eq!(registry.get::<Health>(entity), Some(&Health(10)));
        assert_eq!(registry.get::<Label>(entity), Some(&Label("hero")));

        registry.get_mut::<Health>(entity).unwrap().0 = 4;
        assert_eq!(registry.remove::<Health>(entity), Some(Health(4)));
        assert!(!registry.has::<Health>(entity));
        assert!(registry.has::<Label>(entity));
    }

    #[test]
    fn destroy_removes_components_and_keeps_dense_storage_consistent() {
        let mut registry = Registry::new();
        let a = registry.create();
        let b = registry.create();
        let c = registry.create();
        for (entity, hp) in [(a, 1), (b, 2), (c, 3)] {
            registry.insert(entity, Health(hp)).unwrap();
        }
        registry.destroy(a);
        assert_eq!(registry.get::<Health>(b), Some(&Health(2)));
        assert_eq!(registry.get::<Health>(c), Some(&Health(3)));
        assert_eq!(registry.view::<Health>().count(), 2);
    }

    #[test]
    fn iteration_follows_creation_order() {
        let mut registry = Registry::new();
        let a = registry.create();
        let b = registry.create();
        let c = registry.create();
        registry.destroy(b);
        let d = registry.create();
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec![a, c, d]);
    }

    #[test]
    fn mass_destroy_keeps_order_and_count() {
        let mut registry = Registry::new();
        let entities: Vec<Entity> = (0..1000).map(|_| registry.create()).collect();
        for entity in entities.iter().filter(|entity| entity.index() % 3 != 0) {
            assert!(registry.destroy(*entity));
        }
        let survivors: Vec<Entity> = entities
            .iter()
            .copied()
            .filter(|entity| entity.index() % 3 == 0)
            .collect();
        assert_eq!(registry.len(), survivors.len());
        assert_eq!(registry.iter().collect::<Vec<_>>(), survivors);
        assert!(registry.order.len() < entities.len());

        let recycled = registry.create();
        assert_eq!(registry.iter().last(), Some(recycled));
        assert_eq!(registry.len(), survivors.len() + 1);
    }

    #[test]
    fn builder_attaches_components_to_a_new_entity() {
        let mut registry = Registry::new();
        let entity = registry.build().with(Health(3)).with(Label("built")).entity();
        assert!(registry.contains(entity));
        assert_eq!(registry.get::<Health>(entity), Some(&Health(3)));
        assert_eq!(registry.get::<Label>(entity), Some(&Label("built")));
    }

    #[test]
    fn get_or_insert_with_keeps_existing_value() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.insert(entity, Health(7)).unwrap();
        let health = registry.get_or_insert_with(entity, || Health(0)).unwrap();
        assert_eq!(health.0, 7);
    }
}
