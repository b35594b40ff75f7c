use std::fmt;

use roxmltree::Node;

use crate::components::{
    BodyType, CameraComponent, CircleCollider2DComponent, NameComponent, PointLightComponent,
    PrimitiveComponent, PrimitiveShape, Projection, RigidBody2DComponent, SpriteComponent,
    TransformComponent,
};
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::{Component, Registry};
use crate::xml::{
    format_vec2, format_vec3, format_vec4, optional_text, parse_field, parse_vec2, parse_vec3,
    parse_vec4, required_text, verbatim_text, XmlElement,
};

/// A component that can be written to and read from a scene file.
pub trait ComponentCodec: Component + Clone + Default + fmt::Debug {
    /// Element name used for the component inside `<Entity>`.
    const ELEMENT: &'static str;

    fn encode(&self) -> XmlElement;

    fn decode(node: Node<'_, '_>) -> SceneResult<Self>;
}

/// Component value detached from any registry, waiting to be attached.
pub(crate) trait StagedComponent: fmt::Debug {
    fn encode(&self) -> XmlElement;

    fn attach(self: Box<Self>, registry: &mut Registry, entity: Entity) -> SceneResult<()>;
}

impl<T: ComponentCodec> StagedComponent for T {
    fn encode(&self) -> XmlElement {
        ComponentCodec::encode(self)
    }

    fn attach(self: Box<Self>, registry: &mut Registry, entity: Entity) -> SceneResult<()> {
        registry.insert(entity, *self).map(|_| ())
    }
}

/// Type-erased operations for one serializable component type.
#[derive(Clone, Copy)]
pub(crate) struct CodecEntry {
    pub element: &'static str,
    pub capture: fn(&Registry, Entity) -> Option<Box<dyn StagedComponent>>,
    pub decode: fn(Node<'_, '_>) -> SceneResult<Box<dyn StagedComponent>>,
    pub has: fn(&Registry, Entity) -> bool,
    pub insert_default: fn(&mut Registry, Entity) -> SceneResult<()>,
    pub remove: fn(&mut Registry, Entity) -> bool,
}

fn capture<T: ComponentCodec>(registry: &Registry, entity: Entity) -> Option<Box<dyn StagedComponent>> {
    registry
        .get::<T>(entity)
        .map(|component| Box::new(component.clone()) as Box<dyn StagedComponent>)
}

fn decode<T: ComponentCodec>(node: Node<'_, '_>) -> SceneResult<Box<dyn StagedComponent>> {
    Ok(Box::new(T::decode(node)?))
}

fn has<T: ComponentCodec>(registry: &Registry, entity: Entity) -> bool {
    registry.has::<T>(entity)
}

fn insert_default<T: ComponentCodec>(registry: &mut Registry, entity: Entity) -> SceneResult<()> {
    registry.get_or_insert_with(entity, T::default).map(|_| ())
}

fn remove<T: ComponentCodec>(registry: &mut Registry, entity: Entity) -> bool {
    registry.remove::<T>(entity).is_some()
}

fn entry<T: ComponentCodec>() -> CodecEntry {
    CodecEntry {
        element: T::ELEMENT,
        capture: capture::<T>,
        decode: decode::<T>,
        has: has::<T>,
        insert_default: insert_default::<T>,
        remove: remove::<T>,
    }
}

/// Every serializable component, in the order they are written.
pub(crate) fn codecs() -> [CodecEntry; 8] {
    [
        entry::<NameComponent>(),
        entry::<TransformComponent>(),
        entry::<CameraComponent>(),
        entry::<PointLightComponent>(),
        entry::<PrimitiveComponent>(),
        entry::<SpriteComponent>(),
        entry::<RigidBody2DComponent>(),
        entry::<CircleCollider2DComponent>(),
    ]
}

pub(crate) fn codec_for(element: &str) -> Option<CodecEntry> {
    codecs().into_iter().find(|codec| codec.element == element)
}

/// Element names of every serializable component.
pub fn component_names() -> Vec<&'static str> {
    codecs().iter().map(|codec| codec.element).collect()
}

/// Element names of the serializable components attached to `entity`.
pub fn attached_components(registry: &Registry, entity: Entity) -> Vec<&'static str> {
    codecs()
        .iter()
        .filter(|codec| (codec.has)(registry, entity))
        .map(|codec| codec.element)
        .collect()
}

impl ComponentCodec for NameComponent {
    const ELEMENT: &'static str = "Name";

    fn encode(&self) -> XmlElement {
        XmlElement::text_element(Self::ELEMENT, &self.name)
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        Ok(Self::new(node.text().unwrap_or_default()))
    }
}

impl ComponentCodec for TransformComponent {
    const ELEMENT: &'static str = "Transform";

    fn encode(&self) -> XmlElement {
        XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Position", format_vec3(self.position)))
            .with_child(XmlElement::text_element("Rotation", format_vec3(self.rotation)))
            .with_child(XmlElement::text_element("Scale", format_vec3(self.scale)))
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        Ok(Self {
            position: parse_vec3(&node, Self::ELEMENT, "Position", default.position)?,
            rotation: parse_vec3(&node, Self::ELEMENT, "Rotation", default.rotation)?,
            scale: parse_vec3(&node, Self::ELEMENT, "Scale", default.scale)?,
        })
    }
}

impl ComponentCodec for CameraComponent {
    const ELEMENT: &'static str = "Camera";

    fn encode(&self) -> XmlElement {
        let projection = match self.projection {
            Projection::Perspective => "Perspective",
            Projection::Orthographic => "Orthographic",
        };
        XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Primary", self.primary))
            .with_child(XmlElement::text_element("FixedAspectRatio", self.fixed_aspect_ratio))
            .with_child(XmlElement::text_element("Projection", projection))
            .with_child(XmlElement::text_element("Fov", self.fov))
            .with_child(XmlElement::text_element("OrthoSize", self.ortho_size))
            .with_child(XmlElement::text_element("Near", self.near))
            .with_child(XmlElement::text_element("Far", self.far))
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        let projection = match optional_text(&node, "Projection").as_deref() {
            None | Some("Perspective") => Projection::Perspective,
            Some("Orthographic") => Projection::Orthographic,
            Some(other) => {
                return Err(SceneError::InvalidValue {
                    element: Self::ELEMENT,
                    field: "Projection",
                    message: format!("unknown projection `{other}`"),
                })
            }
        };
        Ok(Self {
            primary: parse_field(&node, Self::ELEMENT, "Primary", default.primary)?,
            fixed_aspect_ratio: parse_field(
                &node,
                Self::ELEMENT,
                "FixedAspectRatio",
                default.fixed_aspect_ratio,
            )?,
            projection,
            fov: parse_field(&node, Self::ELEMENT, "Fov", default.fov)?,
            ortho_size: parse_field(&node, Self::ELEMENT, "OrthoSize", default.ortho_size)?,
            near: parse_field(&node, Self::ELEMENT, "Near", default.near)?,
            far: parse_field(&node, Self::ELEMENT, "Far", default.far)?,
        })
    }
}

impl ComponentCodec for PointLightComponent {
    const ELEMENT: &'static str = "PointLight";

    fn encode(&self) -> XmlElement {
        XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Colour", format_vec3(self.colour)))
            .with_child(XmlElement::text_element("Intensity", self.intensity))
            .with_child(XmlElement::text_element("Range", self.range))
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        Ok(Self {
            colour: parse_vec3(&node, Self::ELEMENT, "Colour", default.colour)?,
            intensity: parse_field(&node, Self::ELEMENT, "Intensity", default.intensity)?,
            range: parse_field(&node, Self::ELEMENT, "Range", default.range)?,
        })
    }
}

impl ComponentCodec for PrimitiveComponent {
    const ELEMENT: &'static str = "Primitive";

    fn encode(&self) -> XmlElement {
        let element = XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Shape", self.shape.name()));
        let fields: Vec<(&str, String)> = match self.shape {
            PrimitiveShape::Cube {
                width,
                height,
                depth,
            } => vec![
                ("Width", width.to_string()),
                ("Height", height.to_string()),
                ("Depth", depth.to_string()),
            ],
            PrimitiveShape::Sphere {
                radius,
                longitude_lines,
                latitude_lines,
            } => vec![
                ("Radius", radius.to_string()),
                ("LongitudeLines", longitude_lines.to_string()),
                ("LatitudeLines", latitude_lines.to_string()),
            ],
            PrimitiveShape::Plane {
                width,
                length,
                width_lines,
                length_lines,
            } => vec![
                ("Width", width.to_string()),
                ("Length", length.to_string()),
                ("WidthLines", width_lines.to_string()),
                ("LengthLines", length_lines.to_string()),
            ],
            PrimitiveShape::Cylinder {
                bottom_radius,
                top_radius,
                height,
                slice_count,
                stack_count,
            } => vec![
                ("BottomRadius", bottom_radius.to_string()),
                ("TopRadius", top_radius.to_string()),
                ("Height", height.to_string()),
                ("SliceCount", slice_count.to_string()),
                ("StackCount", stack_count.to_string()),
            ],
            PrimitiveShape::Cone {
                bottom_radius,
                height,
                slice_count,
                stack_count,
            } => vec![
                ("BottomRadius", bottom_radius.to_string()),
                ("Height", height.to_string()),
                ("SliceCount", slice_count.to_string()),
                ("StackCount", stack_count.to_string()),
            ],
            PrimitiveShape::Torus {
                outer_radius,
                inner_radius,
                slice_count,
            } => vec![
                ("OuterRadius", outer_radius.to_string()),
                ("InnerRadius", inner_radius.to_string()),
                ("SliceCount", slice_count.to_string()),
            ],
        };
        fields
            .into_iter()
            .fold(element, |element, (tag, value)| {
                element.with_child(XmlElement::text_element(tag, value))
            })
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        const E: &str = PrimitiveComponent::ELEMENT;
        let name = required_text(&node, E, "Shape")?;
        let defaults = PrimitiveShape::from_name(&name).ok_or_else(|| SceneError::InvalidValue {
            element: E,
            field: "Shape",
            message: format!("unknown shape `{name}`"),
        })?;
        let shape = match defaults {
            PrimitiveShape::Cube {
                width,
                height,
                depth,
            } => PrimitiveShape::Cube {
                width: parse_field(&node, E, "Width", width)?,
                height: parse_field(&node, E, "Height", height)?,
                depth: parse_field(&node, E, "Depth", depth)?,
            },
            PrimitiveShape::Sphere {
                radius,
                longitude_lines,
                latitude_lines,
            } => PrimitiveShape::Sphere {
                radius: parse_field(&node, E, "Radius", radius)?,
                longitude_lines: parse_field(&node, E, "LongitudeLines", longitude_lines)?,
                latitude_lines: parse_field(&node, E, "LatitudeLines", latitude_lines)?,
            },
            PrimitiveShape::Plane {
                width,
                length,
                width_lines,
                length_lines,
            } => PrimitiveShape::Plane {
                width: parse_field(&node, E, "Width", width)?,
                length: parse_field(&node, E, "Length", length)?,
                width_lines: parse_field(&node, E, "WidthLines", width_lines)?,
                length_lines: parse_field(&node, E, "LengthLines", length_lines)?,
            },
            PrimitiveShape::Cylinder {
                bottom_radius,
                top_radius,
                height,
                slice_count,
                stack_count,
            } => PrimitiveShape::Cylinder {
                bottom_radius: parse_field(&node, E, "BottomRadius", bottom_radius)?,
                top_radius: parse_field(&node, E, "TopRadius", top_radius)?,
                height: parse_field(&node, E, "Height", height)?,
                slice_count: parse_field(&node, E, "SliceCount", slice_count)?,
                stack_count: parse_field(&node, E, "StackCount", stack_count)?,
            },
            PrimitiveShape::Cone {
                bottom_radius,
                height,
                slice_count,
                stack_count,
            } => PrimitiveShape::Cone {
                bottom_radius: parse_field(&node, E, "BottomRadius", bottom_radius)?,
                height: parse_field(&node, E, "Height", height)?,
                slice_count: parse_field(&node, E, "SliceCount", slice_count)?,
                stack_count: parse_field(&node, E, "StackCount", stack_count)?,
            },
            PrimitiveShape::Torus {
                outer_radius,
                inner_radius,
                slice_count,
            } => PrimitiveShape::Torus {
                outer_radius: parse_field(&node, E, "OuterRadius", outer_radius)?,
                inner_radius: parse_field(&node, E, "InnerRadius", inner_radius)?,
                slice_count: parse_field(&node, E, "SliceCount", slice_count)?,
            },
        };
        Ok(Self { shape })
    }
}

impl ComponentCodec for SpriteComponent {
    const ELEMENT: &'static str = "Sprite";

    fn encode(&self) -> XmlElement {
        let mut element = XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Tint", format_vec4(self.tint)))
            .with_child(XmlElement::text_element("TilingFactor", self.tiling_factor));
        if let Some(texture) = &self.texture {
            element.push(XmlElement::text_element("Texture", texture));
        }
        element
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        Ok(Self {
            tint: parse_vec4(&node, Self::ELEMENT, "Tint", default.tint)?,
            texture: verbatim_text(&node, "Texture"),
            tiling_factor: parse_field(&node, Self::ELEMENT, "TilingFactor", default.tiling_factor)?,
        })
    }
}

impl ComponentCodec for RigidBody2DComponent {
    const ELEMENT: &'static str = "RigidBody2D";

    fn encode(&self) -> XmlElement {
        XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("BodyType", self.body_type.name()))
            .with_child(XmlElement::text_element("FixedRotation", self.fixed_rotation))
            .with_child(XmlElement::text_element("GravityScale", self.gravity_scale))
            .with_child(XmlElement::text_element("AngularDamping", self.angular_damping))
            .with_child(XmlElement::text_element("LinearDamping", self.linear_damping))
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        let body_type = match optional_text(&node, "BodyType") {
            None => default.body_type,
            Some(name) => BodyType::from_name(&name).ok_or_else(|| SceneError::InvalidValue {
                element: Self::ELEMENT,
                field: "BodyType",
                message: format!("unknown body type `{name}`"),
            })?,
        };
        Ok(Self {
            body_type,
            fixed_rotation: parse_field(&node, Self::ELEMENT, "FixedRotation", default.fixed_rotation)?,
            gravity_scale: parse_field(&node, Self::ELEMENT, "GravityScale", default.gravity_scale)?,
            angular_damping: parse_field(
                &node,
                Self::ELEMENT,
                "AngularDamping",
                default.angular_damping,
            )?,
            linear_damping: parse_field(&node, Self::ELEMENT, "LinearDamping", default.linear_damping)?,
        })
    }
}

impl ComponentCodec for CircleCollider2DComponent {
    const ELEMENT: &'static str = "CircleCollider2D";

    fn encode(&self) -> XmlElement {
        XmlElement::new(Self::ELEMENT)
            .with_child(XmlElement::text_element("Offset", format_vec2(self.offset)))
            .with_child(XmlElement::text_element("Radius", self.radius))
            .with_child(XmlElement::text_element("Density", self.density))
            .with_child(XmlElement::text_element("Friction", self.friction))
            .with_child(XmlElement::text_element("Restitution", self.restitution))
    }

    fn decode(node: Node<'_, '_>) -> SceneResult<Self> {
        let default = Self::default();
        Ok(Self {
            offset: parse_vec2(&node, Self::ELEMENT, "Offset", default.offset)?,
            radius: parse_field(&node, Self::ELEMENT, "Radius", default.radius)?,
            density: parse_field(&node, Self::ELEMENT, "Density", default.density)?,
            friction: parse_field(&node, Self::ELEMENT, "Friction", default.friction)?,
            restitution: parse_field(&node, Self::ELEMENT, "Restitution", default.restitution)?,
        })
    }
}
