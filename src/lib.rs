//! Entity hierarchy, scene persistence and editor plumbing for the Forge
//! engine.
//!
//! Entities live in a type-indexed component [`Registry`]; parent/child
//! links are overlaid through [`HierarchyComponent`] and mutated only via
//! [`scene_graph`]. A [`Scene`] adds dirty tracking, persistent ids and XML
//! save/load on top, and the [`editor`] module drives the hierarchy panel
//! (selection, clipboard, drag-and-drop) without any UI toolkit attached.

pub mod clipboard;
pub mod commands;
pub mod components;
pub mod editor;
pub mod entity;
pub mod error;
pub mod registry;
pub mod scene;
pub mod scene_graph;
pub mod scripting;
pub mod serializer;
pub mod shared;
pub mod xml;

pub use clipboard::{Clipboard, MemoryClipboard};
pub use commands::{CommandQueue, SceneCommand};
pub use components::{
    BodyType, CameraComponent, CircleCollider2DComponent, HierarchyComponent, IdComponent,
    NameComponent, PointLightComponent, PrimitiveComponent, PrimitiveShape, Projection,
    RigidBody2DComponent, SpriteComponent, TransformComponent,
};
pub use editor::{EntityPreset, HierarchyEditor, NameFilter, TreeRow};
pub use entity::{Entity, RegistryId};
pub use error::{SceneError, SceneResult};
pub use registry::{Component, EntityBuilder, Registry};
pub use scene::{Scene, SceneEvent, SceneSettings};
pub use scripting::LuaScriptHost;
pub use serializer::{attached_components, Blueprint, IdentityMode};
pub use shared::SharedScene;
pub use xml::XmlElement;
