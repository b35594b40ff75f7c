use log::debug;
use roxmltree::Node;

use super::codec::{codec_for, codecs, StagedComponent};
use super::ENTITY_ELEMENT;
use crate::components::IdComponent;
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::Registry;
use crate::scene_graph;
use crate::xml::XmlElement;

const CHILDREN_ELEMENT: &str = "Children";

/// One entity of a [`Blueprint`].
#[derive(Debug)]
pub(crate) struct BlueprintNode {
    pub(crate) id: Option<u64>,
    /// Index of the parent node; `None` only for the root.
    pub(crate) parent: Option<usize>,
    pub(crate) components: Vec<Box<dyn StagedComponent>>,
}

/// Detached, fully validated copy of an entity subtree.
///
/// Built either from a live registry or from XML; nothing is created in a
/// scene until the blueprint is instantiated. Nodes are stored flat in
/// depth-first pre-order, so the root comes first, every parent precedes
/// its children and siblings keep their order.
#[derive(Debug)]
pub struct Blueprint {
    pub(crate) nodes: Vec<BlueprintNode>,
}

impl Blueprint {
    /// Copies `entity`, its serializable components and its whole subtree.
    pub fn capture(registry: &Registry, entity: Entity) -> SceneResult<Self> {
        if !registry.contains(entity) {
            return Err(SceneError::InvalidEntity(entity));
        }
        let mut nodes = Vec::new();
        let mut pending = vec![(entity, None, entity)];
        while let Some((entity, parent, owner)) = pending.pop() {
            if nodes.len() >= registry.len() {
                // More nodes than entities means the child links loop.
                return Err(SceneError::Cycle {
                    child: entity,
                    parent: owner,
                });
            }
            let index = nodes.len();
            nodes.push(BlueprintNode {
                id: registry.get::<IdComponent>(entity).map(|id| id.0),
                parent,
                components: codecs()
                    .iter()
                    .filter_map(|codec| (codec.capture)(registry, entity))
                    .collect(),
            });
            let children: Vec<Entity> = scene_graph::children(registry, entity).collect();
            pending.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(index), entity)),
            );
        }
        Ok(Self { nodes })
    }

    /// Parses an `<Entity>` element and everything below it.
    pub fn from_xml(node: Node<'_, '_>) -> SceneResult<Self> {
        if !node.has_tag_name(ENTITY_ELEMENT) {
            return Err(SceneError::UnexpectedElement {
                expected: ENTITY_ELEMENT,
                found: node.tag_name().name().to_string(),
            });
        }
        let mut nodes = Vec::new();
        let mut pending = vec![(node, None)];
        while let Some((node, parent)) = pending.pop() {
            let index = nodes.len();
            let mut components = Vec::new();
            let mut children = Vec::new();
            for child in node.children().filter(Node::is_element) {
                let name = child.tag_name().name();
                if name == CHILDREN_ELEMENT {
                    for nested in child.children().filter(Node::is_element) {
                        if nested.has_tag_name(ENTITY_ELEMENT) {
                            children.push(nested);
                        } else {
                            debug!("ignoring <{}> inside <Children>", nested.tag_name().name());
                        }
                    }
                } else if let Some(codec) = codec_for(name) {
                    components.push((codec.decode)(child)?);
                } else {
                    debug!("ignoring unknown element <{name}>");
                }
            }
            nodes.push(BlueprintNode {
                id: parse_id(node)?,
                parent,
                components,
            });
            pending.extend(children.into_iter().rev().map(|child| (child, Some(index))));
        }
        Ok(Self { nodes })
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut elements: Vec<XmlElement> = self
            .nodes
            .iter()
            .map(|node| {
                let mut element = XmlElement::new(ENTITY_ELEMENT);
                if let Some(id) = node.id {
                    element = element.with_attribute("id", id);
                }
                for component in &node.components {
                    element.push(component.encode());
                }
                element
            })
            .collect();
        // Children are finished before their parent, collected last to first.
        let mut nested: Vec<Vec<XmlElement>> = self.nodes.iter().map(|_| Vec::new()).collect();
        let mut root = XmlElement::new(ENTITY_ELEMENT);
        while let Some(mut element) = elements.pop() {
            let index = elements.len();
            let mut children = std::mem::take(&mut nested[index]);
            if !children.is_empty() {
                let mut list = XmlElement::new(CHILDREN_ELEMENT);
                while let Some(child) = children.pop() {
                    list.push(child);
                }
                element.push(list);
            }
            match self.nodes[index].parent {
                Some(parent) => nested[parent].push(element),
                None => root = element,
            }
        }
        root
    }

    /// Number of entities the blueprint creates when instantiated.
    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    /// Persistent id stored for the root entity.
    pub fn id(&self) -> Option<u64> {
        self.nodes.first().and_then(|node| node.id)
    }
}

fn parse_id(node: Node<'_, '_>) -> SceneResult<Option<u64>> {
    node.attribute("id")
        .map(|value| {
            value.trim().parse::<u64>().map_err(|err| SceneError::InvalidValue {
                element: ENTITY_ELEMENT,
                field: "id",
                message: format!("`{value}`: {err}"),
            })
        })
        .transpose()
}
