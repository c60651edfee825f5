//! 検出結果JSONからシーンを構築してJSONに書き出す
//!
//! 使い方: scene_export <observation.json> [output.json] [--literal] [--image <path>]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use pose3d_scene::config::Config;
use pose3d_scene::logging;
use pose3d_scene::pose::Observation;
use pose3d_scene::scene::{load_source_image, CameraMode, ImageSource, SceneComposer, SceneExport};

const CONFIG_PATH: &str = "config.toml";

struct Args {
    observation: PathBuf,
    output: Option<PathBuf>,
    image: Option<PathBuf>,
    literal: bool,
}

fn parse_args() -> Result<Args> {
    let mut observation = None;
    let mut output = None;
    let mut image = None;
    let mut literal = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--literal" => literal = true,
            "--image" => {
                let path = args.next().context("--image requires a path")?;
                image = Some(PathBuf::from(path));
            }
            _ if observation.is_none() => observation = Some(PathBuf::from(arg)),
            _ if output.is_none() => output = Some(PathBuf::from(arg)),
            _ => bail!("Unexpected argument: {}", arg),
        }
    }

    let observation = match observation {
        Some(p) => p,
        None => bail!("Usage: scene_export <observation.json> [output.json] [--literal] [--image <path>]"),
    };
    Ok(Args { observation, output, image, literal })
}

fn main() -> Result<()> {
    let args = parse_args()?;
    logging::init("export", log::LevelFilter::Warn)?;
    let config = Config::load_or_default(CONFIG_PATH);

    let observation = Observation::load(&args.observation)
        .with_context(|| format!("Failed to load observation {}", args.observation.display()))?;
    eprintln!(
        "Observation: {} joints ({})",
        observation.available_joint_names().len(),
        env!("GIT_VERSION")
    );

    // --image なしなら画像平面は作らない
    let image = match &args.image {
        Some(path) => ImageSource::from_load(load_source_image(path)),
        None => ImageSource::NoImage,
    };

    let mut composer = SceneComposer::new(config.render.clone());
    if args.literal {
        composer.set_mode(CameraMode::Literal);
    }
    let composed = composer.compose(Some(&observation), &image);
    let export = SceneExport::new(&composed, composer.mode());

    match &args.output {
        Some(path) => {
            export.save(path)?;
            eprintln!(
                "Wrote {} ({} joints, {} bones, scale {:.3})",
                path.display(),
                export.joint_count,
                export.bone_count,
                export.scale
            );
        }
        None => println!("{}", export.to_json()?),
    }
    Ok(())
}
