use log::{debug, warn};
use parking_lot::Mutex;

use crate::entity::Entity;
use crate::error::SceneResult;
use crate::scene::Scene;

/// Structural edit requested while the hierarchy is being walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    Create {
        name: String,
        parent: Option<Entity>,
    },
    Reparent {
        child: Entity,
        parent: Option<Entity>,
    },
    Destroy(Entity),
    Duplicate {
        entity: Entity,
        parent: Option<Entity>,
    },
}

impl SceneCommand {
    fn apply(&self, scene: &mut Scene) -> SceneResult<()> {
        match self {
            Self::Create { name, parent } => {
                match parent {
                    Some(parent) => scene.create_child(name.as_str(), *parent)?,
                    None => scene.create_entity(name.as_str()),
                };
            }
            Self::Reparent { child, parent } => {
                scene.reparent(*child, *parent)?;
            }
            Self::Destroy(entity) => {
                scene.remove_entity(*entity)?;
            }
            Self::Duplicate { entity, parent } => {
                scene.duplicate_entity(*entity, *parent)?;
            }
        }
        Ok(())
    }
}

/// Commands collected during a frame and committed at the frame boundary.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<Vec<SceneCommand>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SceneCommand) {
        self.pending.lock().push(command);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Applies queued commands in order and returns how many succeeded.
    ///
    /// A failing command is logged and skipped; later commands still run.
    pub fn apply(&self, scene: &mut Scene) -> usize {
        let commands = std::mem::take(&mut *self.pending.lock());
        let mut applied = 0;
        for command in commands {
            match command.apply(scene) {
                Ok(()) => applied += 1,
                Err(err) => warn!("skipping {command:?}: {err}"),
            }
        }
        debug!("applied {applied} scene commands");
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph;

    #[test]
    fn commands_apply_in_order_at_the_boundary() {
        let mut scene = Scene::new("Queue");
        let a = scene.create_entity("A");
        let b = scene.create_entity("B");
        let queue = CommandQueue::new();
        queue.push(SceneCommand::Reparent {
            child: b,
            parent: Some(a),
        });
        queue.push(SceneCommand::Create {
            name: "C".into(),
            parent: Some(b),
        });
        assert_eq!(queue.len(), 2);
        assert!(scene_graph::is_root(scene.registry(), b));

        assert_eq!(queue.apply(&mut scene), 2);
        assert!(queue.is_empty());
        assert!(scene.find_entity_by_path("A/B/C").is_some());
    }

    #[test]
    fn failing_commands_are_skipped() {
        let mut scene = Scene::new("Failures");
        let a = scene.create_entity("A");
        let b = scene.create_child("B", a).unwrap();
        let queue = CommandQueue::new();
        queue.push(SceneCommand::Reparent {
            child: a,
            parent: Some(b),
        });
        queue.push(SceneCommand::Duplicate {
            entity: b,
            parent: None,
        });
        queue.push(SceneCommand::Destroy(a));
        queue.push(SceneCommand::Destroy(b));

        assert_eq!(queue.apply(&mut scene), 2);
        assert_eq!(scene.entities().count(), 1);
        assert!(scene.find_entity_by_path("B").is_some());
    }
}
