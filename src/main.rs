use std::env;

use anyhow::{anyhow, Context, Result};

use forge_scene::{
    attached_components, HierarchyEditor, LuaScriptHost, Scene, SceneEvent, SharedScene,
};

const DEFAULT_INSTRUCTION_LIMIT: u64 = 50_000_000;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut scene = Scene::load(&options.path)?;
    for event in scene.take_events() {
        println!("{event}");
    }
    println!(
        "Loaded scene '{}' with {} entities ({} roots)",
        scene.settings().name,
        scene.entities().count(),
        scene.roots().count()
    );

    let shared = SharedScene::new(scene);
    if !options.scripts.is_empty() {
        let host = LuaScriptHost::new(shared.clone())?
            .with_instruction_limit(options.instruction_limit);
        for script in &options.scripts {
            println!("Running {script}");
            host.run_file(script)
                .with_context(|| format!("script {script} failed"))?;
        }
    }

    if options.tree {
        print_tree(&shared.read(), options.filter.as_deref());
    }

    let mut scene = shared.write();
    println!(
        "Scene is {}",
        if scene.is_dirty() { "modified" } else { "unchanged" }
    );
    if let Some(path) = &options.save {
        scene.save_as(path)?;
    }
    for event in scene.take_events() {
        if event != SceneEvent::Changed {
            println!("{event}");
        }
    }
    Ok(())
}

fn print_tree(scene: &Scene, filter: Option<&str>) {
    let mut editor = HierarchyEditor::default();
    if let Some(filter) = filter {
        editor.set_filter(filter);
    }
    println!("Hierarchy:");
    for row in editor.rows(scene) {
        let components: Vec<&str> = attached_components(scene.registry(), row.entity)
            .into_iter()
            .filter(|name| *name != "Name")
            .collect();
        println!(
            "{}- {} [{}]",
            "  ".repeat(row.depth + 1),
            row.name,
            components.join(", ")
        );
    }
}

struct CliOptions {
    path: String,
    scripts: Vec<String>,
    save: Option<String>,
    tree: bool,
    filter: Option<String>,
    instruction_limit: u64,
}

const USAGE: &str = "Usage: forge-scene <scene.xml> [--run-script <file.lua>]... [--save <out.xml>] [--tree] [--filter <pattern>] [--instruction-limit <n>]";

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            path,
            scripts: Vec::new(),
            save: None,
            tree: false,
            filter: None,
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
        };
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--run-script" => options.scripts.push(value("--run-script")?),
                "--save" => options.save = Some(value("--save")?),
                "--tree" => options.tree = true,
                "--filter" => options.filter = Some(value("--filter")?),
                "--instruction-limit" => {
                    let limit = value("--instruction-limit")?;
                    options.instruction_limit = limit
                        .parse()
                        .with_context(|| format!("invalid instruction limit `{limit}`"))?;
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
