use thiserror::Error;

use crate::entity::Entity;

/// Failures reported by scene graph, registry and serializer operations.
///
/// None of these are fatal: the operation that produced one did not modify
/// the scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("entity {0} does not exist in this scene")]
    InvalidEntity(Entity),
    #[error("cannot parent {child} under {parent}: {child} would become its own ancestor")]
    Cycle { child: Entity, parent: Entity },
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },
    #[error("<{element}> is missing <{field}>")]
    MissingField {
        element: &'static str,
        field: &'static str,
    },
    #[error("<{element}> has an invalid {field}: {message}")]
    InvalidValue {
        element: &'static str,
        field: &'static str,
        message: String,
    },
    #[error("unknown component type `{0}`")]
    UnknownComponent(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SceneResult<T> = Result<T, SceneError>;
