use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::registry::Component;

/// Display name of an entity. Not unique and never used for identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameComponent {
    pub name: String,
}

impl NameComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Persistent identifier written to scene files.
///
/// Survives save/load; regenerated whenever an entity is pasted or
/// duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdComponent(pub u64);

/// Intrusive parent/child links overlaid on the flat entity set.
///
/// Children of an entity form a singly linked list starting at
/// `first_child` and continuing through each child's `next_sibling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HierarchyComponent {
    pub parent: Option<Entity>,
    pub first_child: Option<Entity>,
    pub next_sibling: Option<Entity>,
}

/// Local translation, rotation (XYZ Euler angles in degrees) and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl TransformComponent {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraComponent {
    pub primary: bool,
    pub fixed_aspect_ratio: bool,
    pub projection: Projection,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub ortho_size: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            primary: true,
            fixed_aspect_ratio: false,
            projection: Projection::Perspective,
            fov: 45.0,
            ortho_size: 10.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLightComponent {
    pub colour: Vec3,
    pub intensity: f32,
    pub range: f32,
}

impl Default for PointLightComponent {
    fn default() -> Self {
        Self {
            colour: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
        }
    }
}

/// Procedural mesh description. The mesh itself is generated by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveShape {
    Cube {
        width: f32,
        height: f32,
        depth: f32,
    },
    Sphere {
        radius: f32,
        longitude_lines: u32,
        latitude_lines: u32,
    },
    Plane {
        width: f32,
        length: f32,
        width_lines: u32,
        length_lines: u32,
    },
    Cylinder {
        bottom_radius: f32,
        top_radius: f32,
        height: f32,
        slice_count: u32,
        stack_count: u32,
    },
    Cone {
        bottom_radius: f32,
        height: f32,
        slice_count: u32,
        stack_count: u32,
    },
    Torus {
        outer_radius: f32,
        inner_radius: f32,
        slice_count: u32,
    },
}

impl PrimitiveShape {
    pub const NAMES: [&'static str; 6] = ["Cube", "Sphere", "Plane", "Cylinder", "Cone", "Torus"];

    /// Default dimensions for the named shape.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Cube" => Self::Cube {
                width: 1.0,
                height: 1.0,
                depth: 1.0,
            },
            "Sphere" => Self::Sphere {
                radius: 0.5,
                longitude_lines: 16,
                latitude_lines: 32,
            },
            "Plane" => Self::Plane {
                width: 1.0,
                length: 1.0,
                width_lines: 2,
                length_lines: 2,
            },
            "Cylinder" => Self::Cylinder {
                bottom_radius: 0.5,
                top_radius: 0.5,
                height: 1.0,
                slice_count: 32,
                stack_count: 5,
            },
            "Cone" => Self::Cone {
                bottom_radius: 0.5,
                height: 1.0,
                slice_count: 32,
                stack_count: 5,
            },
            "Torus" => Self::Torus {
                outer_radius: 1.0,
                inner_radius: 0.4,
                slice_count: 32,
            },
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cube { .. } => "Cube",
            Self::Sphere { .. } => "Sphere",
            Self::Plane { .. } => "Plane",
            Self::Cylinder { .. } => "Cylinder",
            Self::Cone { .. } => "Cone",
            Self::Torus { .. } => "Torus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveComponent {
    pub shape: PrimitiveShape,
}

impl Default for PrimitiveComponent {
    fn default() -> Self {
        Self {
            shape: PrimitiveShape::Cube {
                width: 1.0,
                height: 1.0,
                depth: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteComponent {
    pub tint: Vec4,
    /// Texture path relative to the project directory.
    pub texture: Option<String>,
    pub tiling_factor: f32,
}

impl Default for SpriteComponent {
    fn default() -> Self {
        Self {
            tint: Vec4::ONE,
            texture: None,
            tiling_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    #[default]
    Static,
    Kinematic,
    Dynamic,
}

impl BodyType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Static" => Some(Self::Static),
            "Kinematic" => Some(Self::Kinematic),
            "Dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::Kinematic => "Kinematic",
            Self::Dynamic => "Dynamic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody2DComponent {
    pub body_type: BodyType,
    pub fixed_rotation: bool,
    pub gravity_scale: f32,
    pub angular_damping: f32,
    pub linear_damping: f32,
}

impl Default for RigidBody2DComponent {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            fixed_rotation: false,
            gravity_scale: 1.0,
            angular_damping: 0.0,
            linear_damping: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleCollider2DComponent {
    pub offset: Vec2,
    pub radius: f32,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for CircleCollider2DComponent {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            radius: 0.5,
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl Component for NameComponent {}
impl Component for IdComponent {}
impl Component for HierarchyComponent {}
impl Component for TransformComponent {}
impl Component for CameraComponent {}
impl Component for PointLightComponent {}
impl Component for PrimitiveComponent {}
impl Component for SpriteComponent {}
impl Component for RigidBody2DComponent {}
impl Component for CircleCollider2DComponent {}
