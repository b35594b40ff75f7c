use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies the registry an entity handle was allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u32);

impl RegistryId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-owning handle to a row in a [`Registry`](crate::registry::Registry).
///
/// Handles carry the slot index, the generation of the slot at the time the
/// entity was created and the id of the owning registry. Destroying an entity
/// bumps the slot generation, so stale handles are reported as missing
/// instead of aliasing whatever entity reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    generation: u32,
    registry: RegistryId,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32, registry: RegistryId) -> Self {
        Self {
            index,
            generation,
            registry,
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Registry the handle belongs to.
    pub fn registry(self) -> RegistryId {
        self.registry
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_unique() {
        let a = RegistryId::next();
        let b = RegistryId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn display_shows_index_and_generation() {
        let entity = Entity::new(7, 2, RegistryId::next());
        assert_eq!(entity.to_string(), "7v2");
    }
}
