use std::{env, path::PathBuf, process};

use anyhow::{bail, Context};
use bvh_anim_importer::{BvhImporter, ImportConfig, ImportSummary, MemoryScene, RotationOrder};

const USAGE: &str = "Usage: bvh_import <file.bvh> [--scale S] [--frame-offset N] \
[--rotation-order XYZ|YZX|ZXY|XZY|YXZ|ZYX] [--retarget PATH] [--reload]";

struct Args {
    input: PathBuf,
    config: ImportConfig,
    reload: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut input = None;
    let mut config = ImportConfig::default();
    let mut reload = false;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .cloned()
                .with_context(|| format!("{} needs a value", name))
        };
        match arg.as_str() {
            "--scale" => {
                config.scale = value("--scale")?
                    .parse()
                    .context("--scale expects a number")?;
            }
            "--frame-offset" => {
                config.frame_offset = value("--frame-offset")?
                    .parse()
                    .context("--frame-offset expects a non-negative integer")?;
            }
            "--rotation-order" => {
                config.rotation_order = value("--rotation-order")?.parse::<RotationOrder>()?;
            }
            "--retarget" => config.retarget_node = Some(value("--retarget")?),
            "--reload" => reload = true,
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            path => {
                if input.replace(PathBuf::from(path)).is_some() {
                    bail!("only one input file is supported");
                }
            }
        }
    }

    Ok(Args {
        input: input.context("missing input file")?,
        config,
        reload,
    })
}

fn print_summary(label: &str, summary: &ImportSummary) {
    println!("{}: root {}", label, summary.root_path);
    println!(
        "  joints: {} created, {} reused",
        summary.joints_created, summary.joints_reused
    );
    println!(
        "  channels: {}, frames applied: {}",
        summary.channels, summary.frames_applied
    );
    if let Some(fps) = summary.header.fps() {
        println!("  frame rate: {:.2} fps", fps);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err:#}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    let mut scene = MemoryScene::new();
    let mut importer = BvhImporter::new(args.config);

    let summary = importer
        .import_file(&args.input, &mut scene)
        .with_context(|| format!("importing {}", args.input.display()))?;
    print_summary("Import", &summary);

    if args.reload {
        let summary = importer
            .reload(&mut scene)
            .with_context(|| format!("reloading {}", args.input.display()))?;
        print_summary("Reload", &summary);
    }

    println!("Scene joints: {}", scene.joint_count());
    Ok(())
}
