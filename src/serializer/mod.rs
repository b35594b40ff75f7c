//! XML reading and writing of entities, subtrees and whole scenes.
//!
//! Decoding always goes through a [`Blueprint`] first, so a malformed
//! document fails before anything is created in the target scene.

mod blueprint;
mod codec;

use log::{debug, warn};
use roxmltree::{Document, Node};

pub use blueprint::Blueprint;
pub use codec::{attached_components, component_names, ComponentCodec};
pub(crate) use codec::{codec_for, CodecEntry};

use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::Registry;
use crate::scene::{Scene, SceneSettings};
use crate::xml::{format_vec2, parse_vec2, XmlElement};

pub const ENTITY_ELEMENT: &str = "Entity";
pub const SCENE_ELEMENT: &str = "Scene";
pub const FORMAT_VERSION: u32 = 1;

const SETTINGS_ELEMENT: &str = "Settings";
const ENTITIES_ELEMENT: &str = "Entities";

/// How persistent ids are assigned when a blueprint is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Keep the stored id unless it is already taken in the scene.
    Preserve,
    /// Always assign a fresh id. Used for paste and duplicate.
    Regenerate,
}

/// Serializes `entity` and its subtree to an `<Entity>` element.
pub fn serialize_entity(registry: &Registry, entity: Entity) -> SceneResult<XmlElement> {
    Ok(Blueprint::capture(registry, entity)?.to_xml())
}

/// Creates a new root entity from an `<Entity>` element.
pub fn deserialize_entity(
    scene: &mut Scene,
    node: Node<'_, '_>,
    identity: IdentityMode,
) -> SceneResult<Entity> {
    let blueprint = Blueprint::from_xml(node)?;
    scene.instantiate(blueprint, None, identity)
}

/// Serializes an entity subtree to a standalone document.
pub fn entity_to_text(registry: &Registry, entity: Entity) -> SceneResult<String> {
    Ok(serialize_entity(registry, entity)?.to_document())
}

/// Parses a standalone `<Entity>` document.
pub fn blueprint_from_text(text: &str) -> SceneResult<Blueprint> {
    let document = Document::parse(text)?;
    Blueprint::from_xml(document.root_element())
}

pub fn serialize_scene(scene: &Scene) -> SceneResult<XmlElement> {
    let settings = scene.settings();
    let mut entities = XmlElement::new(ENTITIES_ELEMENT);
    for root in scene.roots() {
        entities.push(serialize_entity(scene.registry(), root)?);
    }
    Ok(XmlElement::new(SCENE_ELEMENT)
        .with_attribute("name", &settings.name)
        .with_attribute("version", FORMAT_VERSION)
        .with_child(
            XmlElement::new(SETTINGS_ELEMENT)
                .with_child(XmlElement::text_element("Gravity", format_vec2(settings.gravity))),
        )
        .with_child(entities))
}

/// Builds a clean scene from a scene document.
///
/// Every entity is parsed and validated before the first one is created.
pub fn deserialize_scene(text: &str) -> SceneResult<Scene> {
    let document = Document::parse(text)?;
    let root = document.root_element();
    if !root.has_tag_name(SCENE_ELEMENT) {
        return Err(SceneError::UnexpectedElement {
            expected: SCENE_ELEMENT,
            found: root.tag_name().name().to_string(),
        });
    }
    if let Some(version) = root.attribute("version") {
        match version.trim().parse::<u32>() {
            Ok(version) if version > FORMAT_VERSION => {
                warn!("scene format version {version} is newer than {FORMAT_VERSION}");
            }
            Ok(_) => {}
            Err(err) => {
                return Err(SceneError::InvalidValue {
                    element: SCENE_ELEMENT,
                    field: "version",
                    message: format!("`{version}`: {err}"),
                })
            }
        }
    }

    let mut settings = SceneSettings::default();
    if let Some(name) = root.attribute("name") {
        settings.name = name.to_string();
    }
    let mut blueprints = Vec::new();
    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            SETTINGS_ELEMENT => {
                settings.gravity = parse_vec2(&child, SETTINGS_ELEMENT, "Gravity", settings.gravity)?;
            }
            ENTITIES_ELEMENT => {
                for entity in child.children().filter(Node::is_element) {
                    if entity.has_tag_name(ENTITY_ELEMENT) {
                        blueprints.push(Blueprint::from_xml(entity)?);
                    } else {
                        debug!("ignoring <{}> inside <Entities>", entity.tag_name().name());
                    }
                }
            }
            other => debug!("ignoring unknown scene element <{other}>"),
        }
    }

    let mut scene = Scene::with_settings(settings);
    for blueprint in blueprints {
        scene.spawn(blueprint, None, IdentityMode::Preserve)?;
    }
    Ok(scene)
}
