use glam::{Vec2, Vec3};
use mlua::{
    FromLua, Lua, LuaSerdeExt, MetaMethod, MultiValue, Result as LuaResult, Table, UserData,
    UserDataFields, UserDataMethods, Value, Variadic,
};

use crate::entity::Entity;
use crate::error::SceneError;
use crate::scene_graph;
use crate::serializer::{codec_for, CodecEntry};
use crate::shared::SharedScene;

pub(super) struct ScriptContext {
    pub scene: SharedScene,
}

impl ScriptContext {
    pub fn new(scene: SharedScene) -> Self {
        Self { scene }
    }
}

impl Clone for ScriptContext {
    fn clone(&self) -> Self {
        Self {
            scene: self.scene.clone(),
        }
    }
}

pub(super) fn register_globals(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    register_print(lua)?;
    register_datatypes(lua)?;
    register_scene(lua, context)?;
    Ok(())
}

fn register_print(lua: &Lua) -> LuaResult<()> {
    let print = lua.create_function(|lua, values: Variadic<Value>| {
        let mut out = Vec::new();
        for value in values.iter() {
            let text = match value {
                Value::Nil => "nil".to_string(),
                Value::Boolean(b) => b.to_string(),
                Value::String(s) => s.to_str()?.to_string(),
                _ => match lua.coerce_string(value.clone())? {
                    Some(s) => s.to_str()?.to_string(),
                    None => match value {
                        Value::UserData(ud) => tostring(ud)?,
                        other => format!("{other:?}"),
                    },
                },
            };
            out.push(text);
        }
        println!("[Lua] {}", out.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print)?;
    Ok(())
}

fn tostring(ud: &mlua::AnyUserData) -> LuaResult<String> {
    if let Ok(entity) = ud.borrow::<LuaEntity>() {
        return Ok(entity.to_string());
    }
    if let Ok(vector) = ud.borrow::<LuaVector3>() {
        return Ok(vector.to_string());
    }
    Ok("userdata".to_string())
}

fn register_datatypes(lua: &Lua) -> LuaResult<()> {
    let vector3 = lua.create_table()?;
    vector3.set(
        "new",
        lua.create_function(|_, (x, y, z): (Option<f32>, Option<f32>, Option<f32>)| {
            Ok(LuaVector3::new(Vec3::new(
                x.unwrap_or_default(),
                y.unwrap_or_default(),
                z.unwrap_or_default(),
            )))
        })?,
    )?;
    lua.globals().set("Vector3", vector3)?;
    Ok(())
}

fn register_scene(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let table = lua.create_table()?;

    let scene = context.scene.clone();
    let create = lua.create_function(move |_, args: MultiValue| {
        let name = string_argument(&args)?.unwrap_or_else(|| "Entity".to_string());
        let entity = scene.update(|scene| scene.create_entity(name));
        Ok(LuaEntity::new(scene.clone(), entity))
    })?;
    table.set("CreateEntity", create)?;

    let scene = context.scene.clone();
    let find = lua.create_function(move |_, args: MultiValue| {
        let Some(path) = string_argument(&args)? else {
            return Err(mlua::Error::FromLuaConversionError {
                from: "value",
                to: "string",
                message: Some("expected entity path".into()),
            });
        };
        let found = scene.read().find_entity_by_path(&path);
        Ok(found.map(|entity| LuaEntity::new(scene.clone(), entity)))
    })?;
    table.set("FindEntity", find)?;

    let scene = context.scene.clone();
    let remove = lua.create_function(move |_, args: MultiValue| {
        let Some(entity) = entity_argument(&args)? else {
            return Ok(0);
        };
        scene
            .update(|scene| scene.remove_entity(entity))
            .map_err(mlua::Error::external)
    })?;
    table.set("RemoveEntity", remove)?;

    let scene = context.scene.clone();
    let primary_camera = lua.create_function(move |_, _args: MultiValue| {
        let camera = scene.read().primary_camera();
        Ok(camera.map(|entity| LuaEntity::new(scene.clone(), entity)))
    })?;
    table.set("GetPrimaryCamera", primary_camera)?;

    let scene = context.scene.clone();
    let entities = lua.create_function(move |_, _args: MultiValue| {
        let entities: Vec<Entity> = scene.read().entities().collect();
        Ok(entities
            .into_iter()
            .map(|entity| LuaEntity::new(scene.clone(), entity))
            .collect::<Vec<_>>())
    })?;
    table.set("Entities", entities)?;

    let scene = context.scene.clone();
    let is_dirty = lua.create_function(move |_, _args: MultiValue| Ok(scene.read().is_dirty()))?;
    table.set("IsDirty", is_dirty)?;

    let scene = context.scene.clone();
    let settings = lua.create_function(move |lua, _args: MultiValue| {
        let settings = scene.read().settings().clone();
        lua.to_value(&settings)
    })?;
    table.set("GetSettings", settings)?;

    let scene = context.scene.clone();
    let set_gravity = lua.create_function(move |_, args: MultiValue| {
        let numbers: Vec<f32> = args
            .iter()
            .filter_map(|value| match value {
                Value::Integer(i) => Some(*i as f32),
                Value::Number(n) => Some(*n as f32),
                _ => None,
            })
            .collect();
        let [x, y] = numbers.as_slice() else {
            return Err(mlua::Error::RuntimeError(
                "SetGravity expects two numbers".into(),
            ));
        };
        scene.update(|scene| scene.set_gravity(Vec2::new(*x, *y)));
        Ok(())
    })?;
    table.set("SetGravity", set_gravity)?;

    lua.globals().set("Scene", table)?;
    Ok(())
}

fn string_argument(values: &MultiValue) -> LuaResult<Option<String>> {
    for value in values.iter() {
        if let Value::String(s) = value {
            return Ok(Some(s.to_str()?.to_string()));
        }
    }
    Ok(None)
}

fn entity_argument(values: &MultiValue) -> LuaResult<Option<Entity>> {
    for value in values.iter() {
        if let Value::UserData(ud) = value {
            if let Ok(entity) = ud.borrow::<LuaEntity>() {
                return Ok(Some(entity.entity));
            }
        }
    }
    Ok(None)
}

fn component_codec(name: &str) -> LuaResult<CodecEntry> {
    codec_for(name)
        .ok_or_else(|| mlua::Error::external(SceneError::UnknownComponent(name.to_string())))
}

/// Script-side handle to a scene entity.
#[derive(Clone)]
struct LuaEntity {
    scene: SharedScene,
    entity: Entity,
}

impl LuaEntity {
    fn new(scene: SharedScene, entity: Entity) -> Self {
        Self { scene, entity }
    }

    fn related(&self, entity: Option<Entity>) -> Option<LuaEntity> {
        entity.map(|entity| LuaEntity::new(self.scene.clone(), entity))
    }

    fn ensure_valid(&self) -> LuaResult<()> {
        if self.scene.read().contains(self.entity) {
            Ok(())
        } else {
            Err(mlua::Error::external(SceneError::InvalidEntity(self.entity)))
        }
    }
}

impl std::fmt::Display for LuaEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.entity)
    }
}

impl UserData for LuaEntity {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method("IsValid", |_, this, ()| Ok(this.scene.read().contains(this.entity)));
        methods.add_method("GetName", |_, this, ()| Ok(this.scene.name_of(this.entity)));
        methods.add_method("SetName", |_, this, name: String| {
            this.scene
                .update(|scene| scene.set_entity_name(this.entity, name))
                .map_err(mlua::Error::external)
        });
        methods.add_method("AddChild", |_, this, child: LuaEntity| {
            this.scene
                .update(|scene| scene.reparent(child.entity, Some(this.entity)))
                .map_err(mlua::Error::external)
        });
        methods.add_method("GetParent", |_, this, ()| {
            let parent = scene_graph::parent(this.scene.read().registry(), this.entity);
            Ok(this.related(parent))
        });
        methods.add_method("GetSibling", |_, this, ()| {
            let sibling = scene_graph::next_sibling(this.scene.read().registry(), this.entity);
            Ok(this.related(sibling))
        });
        methods.add_method("GetChild", |_, this, ()| {
            let child = scene_graph::first_child(this.scene.read().registry(), this.entity);
            Ok(this.related(child))
        });
        methods.add_method("Destroy", |_, this, ()| {
            this.scene
                .update(|scene| scene.remove_entity(this.entity))
                .map_err(mlua::Error::external)
        });
        methods.add_method("HasComponent", |_, this, name: String| {
            let codec = component_codec(&name)?;
            Ok((codec.has)(this.scene.read().registry(), this.entity))
        });
        methods.add_method("AddComponent", |_, this, name: String| {
            let codec = component_codec(&name)?;
            this.scene
                .update(|scene| {
                    (codec.insert_default)(scene.registry_mut(), this.entity)?;
                    scene.mark_dirty();
                    Ok::<_, SceneError>(())
                })
                .map_err(mlua::Error::external)
        });
        methods.add_method("RemoveComponent", |_, this, name: String| {
            let codec = component_codec(&name)?;
            Ok(this.scene.update(|scene| {
                let removed = (codec.remove)(scene.registry_mut(), this.entity);
                if removed {
                    scene.mark_dirty();
                }
                removed
            }))
        });
        methods.add_method("GetTransform", |_, this, ()| {
            this.ensure_valid()?;
            Ok(LuaTransform {
                scene: this.scene.clone(),
                entity: this.entity,
            })
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: LuaEntity| {
            Ok(this.entity == other.entity)
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

impl<'lua> FromLua<'lua> for LuaEntity {
    fn from_lua(value: Value<'lua>, _: &'lua Lua) -> LuaResult<Self> {
        match value {
            Value::UserData(ud) => ud.borrow::<LuaEntity>().map(|entity| entity.clone()),
            _ => Err(mlua::Error::FromLuaConversionError {
                from: value.type_name(),
                to: "Entity",
                message: Some("expected Entity userdata".into()),
            }),
        }
    }
}

/// Live view of an entity's transform. Reads and writes go straight to the scene.
struct LuaTransform {
    scene: SharedScene,
    entity: Entity,
}

impl UserData for LuaTransform {
    fn add_fields<'lua, F: UserDataFields<'lua, Self>>(fields: &mut F) {
        fields.add_field_method_get("Position", |_, this| {
            Ok(this
                .scene
                .transform(this.entity)
                .map(|transform| LuaVector3::new(transform.position)))
        });
        fields.add_field_method_get("Rotation", |_, this| {
            Ok(this
                .scene
                .transform(this.entity)
                .map(|transform| LuaVector3::new(transform.rotation)))
        });
        fields.add_field_method_get("Scale", |_, this| {
            Ok(this
                .scene
                .transform(this.entity)
                .map(|transform| LuaVector3::new(transform.scale)))
        });

        fields.add_field_method_set("Position", |_, this, value: LuaVector3| {
            this.scene.set_position(this.entity, value.as_vec3());
            Ok(())
        });
        fields.add_field_method_set("Rotation", |_, this, value: LuaVector3| {
            this.scene.set_rotation(this.entity, value.as_vec3());
            Ok(())
        });
        fields.add_field_method_set("Scale", |_, this, value: LuaVector3| {
            this.scene.set_scale(this.entity, value.as_vec3());
            Ok(())
        });
    }

    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method("GetWorldPosition", |_, this, ()| {
            let scene = this.scene.read();
            if !scene.contains(this.entity) {
                return Ok(None);
            }
            let world = scene_graph::world_matrix(scene.registry(), this.entity);
            Ok(Some(LuaVector3::new(world.transform_point3(Vec3::ZERO))))
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct LuaVector3(Vec3);

impl LuaVector3 {
    fn new(inner: Vec3) -> Self {
        Self(inner)
    }

    fn as_vec3(self) -> Vec3 {
        self.0
    }
}

impl std::fmt::Display for LuaVector3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.0.x, self.0.y, self.0.z)
    }
}

impl UserData for LuaVector3 {
    fn add_fields<'lua, F: UserDataFields<'lua, Self>>(fields: &mut F) {
        fields.add_field_method_get("X", |_, this| Ok(this.0.x));
        fields.add_field_method_get("Y", |_, this| Ok(this.0.y));
        fields.add_field_method_get("Z", |_, this| Ok(this.0.z));
        fields.add_field_method_get("x", |_, this| Ok(this.0.x));
        fields.add_field_method_get("y", |_, this| Ok(this.0.y));
        fields.add_field_method_get("z", |_, this| Ok(this.0.z));
    }

    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Add, |_, this, other: LuaVector3| {
            Ok(LuaVector3::new(this.0 + other.0))
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: LuaVector3| Ok(this.0 == other.0));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

impl<'lua> FromLua<'lua> for LuaVector3 {
    fn from_lua(value: Value<'lua>, _: &'lua Lua) -> LuaResult<Self> {
        match value {
            Value::Table(table) => Ok(Self(table_to_vec3(&table)?)),
            Value::UserData(ud) => ud.borrow::<LuaVector3>().map(|vec| *vec),
            _ => Err(mlua::Error::FromLuaConversionError {
                from: value.type_name(),
                to: "Vector3",
                message: Some("expected Vector3 userdata or table".into()),
            }),
        }
    }
}

fn table_to_vec3(table: &Table) -> LuaResult<Vec3> {
    Ok(Vec3::new(
        table_component(table, "x", 1)?,
        table_component(table, "y", 2)?,
        table_component(table, "z", 3)?,
    ))
}

fn table_component(table: &Table, key: &str, index: i32) -> LuaResult<f32> {
    if let Ok(value) = table.get::<_, f32>(key) {
        return Ok(value);
    }
    table.get::<_, f32>(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CameraComponent, PointLightComponent, TransformComponent};
    use crate::scene::Scene;

    fn lua_with(scene: &SharedScene) -> Lua {
        let lua = Lua::new();
        register_globals(&lua, &ScriptContext::new(scene.clone())).unwrap();
        lua
    }

    #[test]
    fn scripts_build_a_hierarchy() {
        let shared = SharedScene::new(Scene::new("Scripted"));
        let lua = lua_with(&shared);
        let (child_name, parent_name, count): (String, String, i64) = lua
            .load(
                r#"
                local player = Scene.CreateEntity("Player")
                local weapon = Scene.CreateEntity("Weapon")
                player:AddChild(weapon)
                local found = Scene.FindEntity("Player/Weapon")
                assert(found == weapon, "path lookup should find the child")
                return player:GetChild():GetName(), weapon:GetParent():GetName(), #Scene.Entities()
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(child_name, "Weapon");
        assert_eq!(parent_name, "Player");
        assert_eq!(count, 2);
        assert!(shared.read().is_dirty());
    }

    #[test]
    fn transform_proxy_writes_through() {
        let shared = SharedScene::new(Scene::new("Transforms"));
        let parent = shared.update(|scene| scene.create_entity("Parent"));
        let child = shared.update(|scene| scene.create_child("Child", parent)).unwrap();
        shared.set_position(parent, Vec3::new(10.0, 0.0, 0.0));

        let lua = lua_with(&shared);
        let world_x: f32 = lua
            .load(
                r#"
                local child = Scene.FindEntity("Parent/Child")
                local transform = child:GetTransform()
                transform.Position = Vector3.new(1, 2, 3)
                transform.Scale = { x = 2, y = 2, z = 2 }
                return transform:GetWorldPosition().X
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(world_x, 11.0);
        let transform = shared.transform(child).unwrap();
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn components_by_name() {
        let shared = SharedScene::new(Scene::new("Components"));
        let lamp = shared.update(|scene| scene.create_entity("Lamp"));
        let lua = lua_with(&shared);
        let (had, has_after_add, removed): (bool, bool, bool) = lua
            .load(
                r#"
                local lamp = Scene.FindEntity("Lamp")
                local had = lamp:HasComponent("PointLight")
                lamp:AddComponent("PointLight")
                local has_after_add = lamp:HasComponent("PointLight")
                return had, has_after_add, lamp:RemoveComponent("Transform")
            "#,
            )
            .eval()
            .unwrap();
        assert!(!had && has_after_add && removed);
        let scene = shared.read();
        assert!(scene.get::<PointLightComponent>(lamp).is_some());
        assert!(scene.get::<TransformComponent>(lamp).is_none());
    }

    #[test]
    fn unknown_component_names_raise_errors() {
        let shared = SharedScene::new(Scene::new("Unknown"));
        let lua = lua_with(&shared);
        let message: String = lua
            .load(
                r#"
                local e = Scene.CreateEntity("E")
                local ok, err = pcall(function() return e:HasComponent("Teleporter") end)
                assert(not ok)
                return tostring(err)
            "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("Teleporter"), "{message}");
    }

    #[test]
    fn settings_are_exposed_as_tables() {
        let shared = SharedScene::new(Scene::new("Settings"));
        let lua = lua_with(&shared);
        let (name, gravity_y): (String, f32) = lua
            .load(
                r#"
                Scene.SetGravity(0, -1.5)
                local settings = Scene.GetSettings()
                return settings.name, settings.gravity[2]
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(name, "Settings");
        assert_eq!(gravity_y, -1.5);
        assert_eq!(shared.read().settings().gravity, Vec2::new(0.0, -1.5));
    }

    #[test]
    fn destroyed_entities_become_invalid() {
        let shared = SharedScene::new(Scene::new("Destroy"));
        let camera = shared.update(|scene| {
            let camera = scene.create_entity("Camera");
            scene.insert(camera, CameraComponent::default()).unwrap();
            camera
        });
        let lua = lua_with(&shared);
        let (removed, valid, camera_after): (i64, bool, bool) = lua
            .load(
                r#"
                local camera = Scene.GetPrimaryCamera()
                assert(camera ~= nil)
                Scene.CreateEntity("Child"):GetName()
                local removed = Scene.RemoveEntity(camera)
                return removed, camera:IsValid(), Scene.GetPrimaryCamera() ~= nil
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!valid);
        assert!(!camera_after);
        assert!(!shared.read().contains(camera));
    }
}
