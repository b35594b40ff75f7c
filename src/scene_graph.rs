//! Parent/child linked-list operations over [`HierarchyComponent`].
//!
//! Every function takes the registry explicitly. Mutations here never mark a
//! scene dirty; [`Scene`](crate::scene::Scene) wraps them for that.

use glam::Mat4;
use log::warn;

use crate::components::{HierarchyComponent, TransformComponent};
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::Registry;

fn links(registry: &Registry, entity: Entity) -> Option<&HierarchyComponent> {
    registry.get::<HierarchyComponent>(entity)
}

pub fn parent(registry: &Registry, entity: Entity) -> Option<Entity> {
    links(registry, entity)?.parent
}

pub fn first_child(registry: &Registry, entity: Entity) -> Option<Entity> {
    links(registry, entity)?.first_child
}

pub fn next_sibling(registry: &Registry, entity: Entity) -> Option<Entity> {
    links(registry, entity)?.next_sibling
}

/// True for live entities without a parent.
pub fn is_root(registry: &Registry, entity: Entity) -> bool {
    registry.contains(entity) && parent(registry, entity).is_none()
}

/// Immediate children of `parent`, in sibling order.
pub fn children(registry: &Registry, parent: Entity) -> Children<'_> {
    Children {
        registry,
        next: first_child(registry, parent),
        budget: registry.len(),
    }
}

/// Parents of `entity`, nearest first. Does not include `entity`.
pub fn ancestors(registry: &Registry, entity: Entity) -> Ancestors<'_> {
    Ancestors {
        registry,
        next: parent(registry, entity),
        budget: registry.len(),
    }
}

/// Depth-first, pre-order walk of `root` and all of its descendants.
pub fn subtree(registry: &Registry, root: Entity) -> Subtree<'_> {
    Subtree {
        registry,
        root,
        next: registry.contains(root).then_some(root),
        budget: registry.len(),
    }
}

/// True if `ancestor` appears on the parent chain of `entity`.
pub fn is_ancestor(registry: &Registry, ancestor: Entity, entity: Entity) -> bool {
    ancestors(registry, entity).any(|candidate| candidate == ancestor)
}

pub struct Children<'a> {
    registry: &'a Registry,
    next: Option<Entity>,
    budget: usize,
}

impl Iterator for Children<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next?;
        if self.budget == 0 {
            warn!("sibling list starting before {current} does not terminate");
            self.next = None;
            return None;
        }
        self.budget -= 1;
        self.next = next_sibling(self.registry, current);
        Some(current)
    }
}

pub struct Ancestors<'a> {
    registry: &'a Registry,
    next: Option<Entity>,
    budget: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next?;
        if self.budget == 0 {
            warn!("parent chain through {current} does not reach a root");
            self.next = None;
            return None;
        }
        self.budget -= 1;
        self.next = parent(self.registry, current);
        Some(current)
    }
}

pub struct Subtree<'a> {
    registry: &'a Registry,
    root: Entity,
    next: Option<Entity>,
    budget: usize,
}

impl Subtree<'_> {
    fn successor(&self, current: Entity) -> Option<Entity> {
        if let Some(child) = first_child(self.registry, current) {
            return Some(child);
        }
        let mut node = current;
        loop {
            if node == self.root {
                return None;
            }
            if let Some(sibling) = next_sibling(self.registry, node) {
                return Some(sibling);
            }
            node = parent(self.registry, node)?;
        }
    }
}

impl Iterator for Subtree<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next?;
        if self.budget == 0 {
            warn!("subtree of {} visits more entities than exist", self.root);
            self.next = None;
            return None;
        }
        self.budget -= 1;
        self.next = self.successor(current);
        Some(current)
    }
}

/// Moves `child` under `new_parent`, or to the root level for `None`.
///
/// The child is prepended to the new parent's child list. Returns `Ok(false)`
/// when nothing had to change (unparenting an entity that is already a
/// root). Parenting an entity under itself or one of its descendants is
/// rejected with [`SceneError::Cycle`] before any link is touched.
pub fn reparent(
    registry: &mut Registry,
    child: Entity,
    new_parent: Option<Entity>,
) -> SceneResult<bool> {
    if !registry.contains(child) {
        return Err(SceneError::InvalidEntity(child));
    }
    let Some(new_parent) = new_parent else {
        if parent(registry, child).is_none() {
            return Ok(false);
        }
        detach(registry, child);
        return Ok(true);
    };
    if !registry.contains(new_parent) {
        return Err(SceneError::InvalidEntity(new_parent));
    }
    if new_parent == child || is_ancestor(registry, child, new_parent) {
        return Err(SceneError::Cycle {
            child,
            parent: new_parent,
        });
    }

    detach(registry, child);
    let previous_first = registry
        .get_or_insert_with(new_parent, HierarchyComponent::default)?
        .first_child
        .replace(child);
    let links = registry.get_or_insert_with(child, HierarchyComponent::default)?;
    links.parent = Some(new_parent);
    links.next_sibling = previous_first;
    Ok(true)
}

/// Promotes `child` to the root level.
pub fn unparent(registry: &mut Registry, child: Entity) -> SceneResult<bool> {
    reparent(registry, child, None)
}

/// Unlinks `child` from its parent's child list and clears its parent link.
fn detach(registry: &mut Registry, child: Entity) {
    let Some(links) = links(registry, child).copied() else {
        return;
    };
    let Some(old_parent) = links.parent else {
        return;
    };

    if first_child(registry, old_parent) == Some(child) {
        if let Some(parent_links) = registry.get_mut::<HierarchyComponent>(old_parent) {
            parent_links.first_child = links.next_sibling;
        }
    } else {
        let previous = children(registry, old_parent)
            .find(|&sibling| next_sibling(registry, sibling) == Some(child));
        match previous.and_then(|previous| registry.get_mut::<HierarchyComponent>(previous)) {
            Some(previous_links) => previous_links.next_sibling = links.next_sibling,
            None => warn!("{child} is missing from the child list of {old_parent}"),
        }
    }

    if let Some(child_links) = registry.get_mut::<HierarchyComponent>(child) {
        child_links.parent = None;
        child_links.next_sibling = None;
    }
}

/// Destroys `entity` and every descendant, returning how many were removed.
pub fn destroy(registry: &mut Registry, entity: Entity) -> SceneResult<usize> {
    if !registry.contains(entity) {
        return Err(SceneError::InvalidEntity(entity));
    }
    detach(registry, entity);
    let doomed: Vec<Entity> = subtree(registry, entity).collect();
    for &entity in &doomed {
        registry.destroy(entity);
    }
    Ok(doomed.len())
}

/// Composes local transforms from the root down to `entity`.
pub fn world_matrix(registry: &Registry, entity: Entity) -> Mat4 {
    let local = |entity: Entity| {
        registry
            .get::<TransformComponent>(entity)
            .map(TransformComponent::local_matrix)
            .unwrap_or(Mat4::IDENTITY)
    };
    ancestors(registry, entity).fold(local(entity), |world, ancestor| local(ancestor) * world)
}

/// Checks every hierarchy link for dangling references and inconsistencies.
///
/// Returns a description of the first violation found.
pub fn validate(registry: &Registry) -> Result<(), String> {
    for entity in registry.iter() {
        let Some(links) = links(registry, entity) else {
            continue;
        };
        for (field, target) in [
            ("parent", links.parent),
            ("first_child", links.first_child),
            ("next_sibling", links.next_sibling),
        ] {
            if let Some(target) = target {
                if !registry.contains(target) {
                    return Err(format!("{entity}.{field} points at destroyed {target}"));
                }
            }
        }
        if let Some(child) = links.first_child {
            if parent(registry, child) != Some(entity) {
                return Err(format!("first child {child} of {entity} has another parent"));
            }
        }
        if let Some(sibling) = links.next_sibling {
            if parent(registry, sibling) != links.parent {
                return Err(format!("sibling {sibling} of {entity} has another parent"));
            }
        }
        if let Some(owner) = links.parent {
            let listed = children(registry, owner).filter(|&c| c == entity).count();
            if listed != 1 {
                return Err(format!("{entity} appears {listed} times under {owner}"));
            }
        }
        if is_ancestor(registry, entity, entity) {
            return Err(format!("{entity} is its own ancestor"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn registry_with(count: usize) -> (Registry, Vec<Entity>) {
        let mut registry = Registry::new();
        let entities = (0..count).map(|_| registry.create()).collect();
        (registry, entities)
    }

    #[test]
    fn reparent_then_unparent_updates_traversal() {
        let (mut registry, e) = registry_with(2);
        let (a, b) = (e[0], e[1]);
        assert!(reparent(&mut registry, b, Some(a)).unwrap());
        assert_eq!(subtree(&registry, a).collect::<Vec<_>>(), vec![a, b]);

        assert!(unparent(&mut registry, b).unwrap());
        assert_eq!(subtree(&registry, a).collect::<Vec<_>>(), vec![a]);
        assert!(is_root(&registry, b));
        validate(&registry).unwrap();
    }

    #[test]
    fn children_are_prepended() {
        let (mut registry, e) = registry_with(4);
        for &child in &e[1..] {
            reparent(&mut registry, child, Some(e[0])).unwrap();
        }
        assert_eq!(
            children(&registry, e[0]).collect::<Vec<_>>(),
            vec![e[3], e[2], e[1]]
        );
        validate(&registry).unwrap();
    }

    #[test]
    fn every_child_appears_exactly_once_under_its_parent() {
        let (mut registry, e) = registry_with(6);
        reparent(&mut registry, e[1], Some(e[0])).unwrap();
        reparent(&mut registry, e[2], Some(e[0])).unwrap();
        reparent(&mut registry, e[3], Some(e[0])).unwrap();
        reparent(&mut registry, e[4], Some(e[2])).unwrap();
        // Move a middle sibling elsewhere and back.
        reparent(&mut registry, e[2], Some(e[5])).unwrap();
        reparent(&mut registry, e[2], Some(e[0])).unwrap();

        for &child in &e[1..5] {
            let owner = parent(&registry, child).unwrap();
            let hits = children(&registry, owner).filter(|&c| c == child).count();
            assert_eq!(hits, 1, "{child} under {owner}");
        }
        validate(&registry).unwrap();
    }

    #[test]
    fn reparenting_under_a_descendant_fails_without_changes() {
        let (mut registry, e) = registry_with(3);
        reparent(&mut registry, e[1], Some(e[0])).unwrap();
        reparent(&mut registry, e[2], Some(e[1])).unwrap();
        let before: Vec<_> = registry
            .iter()
            .map(|entity| registry.get::<HierarchyComponent>(entity).copied())
            .collect();

        let err = reparent(&mut registry, e[0], Some(e[2])).unwrap_err();
        assert!(matches!(err, SceneError::Cycle { .. }));
        let err = reparent(&mut registry, e[1], Some(e[1])).unwrap_err();
        assert!(matches!(err, SceneError::Cycle { .. }));

        let after: Vec<_> = registry
            .iter()
            .map(|entity| registry.get::<HierarchyComponent>(entity).copied())
            .collect();
        assert_eq!(before, after);
        validate(&registry).unwrap();
    }

    #[test]
    fn unparenting_a_root_is_a_no_op() {
        let (mut registry, e) = registry_with(1);
        assert!(!unparent(&mut registry, e[0]).unwrap());
        assert!(!registry.has::<HierarchyComponent>(e[0]));
    }

    #[test]
    fn stale_handles_are_rejected() {
        let (mut registry, e) = registry_with(2);
        registry.destroy(e[1]);
        assert!(matches!(
            reparent(&mut registry, e[1], Some(e[0])),
            Err(SceneError::InvalidEntity(_))
        ));
        assert!(matches!(
            reparent(&mut registry, e[0], Some(e[1])),
            Err(SceneError::InvalidEntity(_))
        ));
    }

    #[test]
    fn subtree_is_pre_order_and_stays_inside_the_root() {
        let (mut registry, e) = registry_with(6);
        // e0 -> [e1 -> [e3], e2], e4 is a sibling of e0 under e5.
        reparent(&mut registry, e[0], Some(e[5])).unwrap();
        reparent(&mut registry, e[4], Some(e[5])).unwrap();
        reparent(&mut registry, e[2], Some(e[0])).unwrap();
        reparent(&mut registry, e[1], Some(e[0])).unwrap();
        reparent(&mut registry, e[3], Some(e[1])).unwrap();

        let order: Vec<_> = subtree(&registry, e[0]).collect();
        assert_eq!(order, vec![e[0], e[1], e[3], e[2]]);
        let again: Vec<_> = subtree(&registry, e[0]).collect();
        assert_eq!(order, again);
    }

    #[test]
    fn destroying_a_subtree_leaves_no_dangling_links() {
        let (mut registry, e) = registry_with(6);
        reparent(&mut registry, e[1], Some(e[0])).unwrap();
        reparent(&mut registry, e[2], Some(e[0])).unwrap();
        reparent(&mut registry, e[3], Some(e[2])).unwrap();
        reparent(&mut registry, e[0], Some(e[4])).unwrap();
        reparent(&mut registry, e[5], Some(e[4])).unwrap();

        let removed = destroy(&mut registry, e[0]).unwrap();
        assert_eq!(removed, 4);
        assert_eq!(registry.len(), 2);
        assert_eq!(children(&registry, e[4]).collect::<Vec<_>>(), vec![e[5]]);
        validate(&registry).unwrap();
    }

    #[test]
    fn world_matrix_composes_parent_transforms() {
        let (mut registry, e) = registry_with(2);
        registry
            .insert(e[0], TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        registry
            .insert(e[1], TransformComponent::from_position(Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();
        reparent(&mut registry, e[1], Some(e[0])).unwrap();
        let world = world_matrix(&registry, e[1]).transform_point3(Vec3::ZERO);
        assert!(world.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }
}
