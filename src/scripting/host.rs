use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use mlua::{FromLuaMulti, HookTriggers, Lua};

use crate::shared::SharedScene;

use super::bindings::{register_globals, ScriptContext};

const HOOK_INTERVAL: u32 = 1000;

/// Runs Lua scripts synchronously against a shared scene.
pub struct LuaScriptHost {
    lua: Lua,
    scene: SharedScene,
    executed: Arc<AtomicU64>,
}

impl LuaScriptHost {
    pub fn new(scene: SharedScene) -> Result<Self> {
        let lua = Lua::new();
        register_globals(&lua, &ScriptContext::new(scene.clone()))
            .context("failed to register Lua globals")?;
        Ok(Self {
            lua,
            scene,
            executed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Aborts any single run after roughly `limit` VM instructions.
    pub fn with_instruction_limit(self, limit: u64) -> Self {
        let executed = Arc::clone(&self.executed);
        self.lua.set_hook(
            HookTriggers {
                every_nth_instruction: Some(HOOK_INTERVAL),
                ..Default::default()
            },
            move |_, _| {
                let total = executed.fetch_add(u64::from(HOOK_INTERVAL), Ordering::Relaxed)
                    + u64::from(HOOK_INTERVAL);
                if total > limit {
                    Err(mlua::Error::RuntimeError(format!(
                        "script exceeded the instruction limit of {limit}"
                    )))
                } else {
                    Ok(())
                }
            },
        );
        self
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    pub fn run(&self, name: &str, source: &str) -> Result<()> {
        self.executed.store(0, Ordering::Relaxed);
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Lua runtime error in {name}"))
    }

    /// Evaluates a chunk and converts its return values.
    pub fn eval<R>(&self, name: &str, source: &str) -> Result<R>
    where
        R: for<'lua> FromLuaMulti<'lua>,
    {
        self.executed.store(0, Ordering::Relaxed);
        self.lua
            .load(source)
            .set_name(name)
            .eval::<R>()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Lua runtime error in {name}"))
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        info!("running script {}", path.display());
        self.run(&path.display().to_string(), &source)
    }
}
