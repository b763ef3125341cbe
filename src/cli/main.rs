use anyhow::{bail, Context, Result};
use clap::Parser;
use ocrdl::logger::init_logger_exe;
use ocrdl::{EngineConfig, OcrEngine, TextBox};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(version, about = "A CLI tool to recognize text through the native OCR library", long_about = None)]
struct Cli {
    #[arg(
        long,
        help = "input file in image (png, jpeg, gif, webp, tiff, bmp, etc) format"
    )]
    image: Option<PathBuf>,
    #[arg(long, help = "image file handed to the OCR library without decoding")]
    image_file: Option<PathBuf>,
    #[arg(long, help = "recognition language, e.g. zh-Hans_en")]
    language: Option<String>,
    #[arg(long, help = "engine config in JSON format")]
    config: Option<PathBuf>,
    #[arg(long, help = "print text boxes along with the text as JSON", default_value_t = false)]
    boxes: bool,
    #[arg(long, help = "print library version information and exit", default_value_t = false)]
    version_info: bool,
    #[arg(
        long,
        help = "progress polling interval in milliseconds",
        default_value_t = 250
    )]
    poll_ms: u64,
}

#[derive(Serialize)]
struct Recognition {
    text: String,
    boxes: Vec<TextBox>,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::from_file(path);
    }

    match dirs::config_dir().map(|dir| dir.join("ocrdl").join("config.json")) {
        Some(default_path) if default_path.is_file() => {
            log::info!("Using config {}", default_path.display());
            EngineConfig::from_file(&default_path)
        }
        _ => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger_exe();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let poll_interval = Duration::from_millis(cli.poll_ms.max(1));

    // loading runs library initializers, keep it off the async workers
    let mut engine = tokio::task::spawn_blocking(move || OcrEngine::new(config)).await?;

    if cli.version_info {
        println!("{}", engine.version_info());
        return Ok(());
    }
    if !engine.is_available() {
        bail!("OCR engine unavailable, see log for details");
    }

    if let Some(language) = &cli.language {
        if !engine.set_language(language) {
            bail!("Failed to set language {}", language);
        }
    }

    if let Some(path) = &cli.image {
        let image = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        engine.set_image(&image)?;
    } else if let Some(path) = &cli.image_file {
        engine.set_image_file(path)?;
    } else {
        bail!("Either --image or --image-file is required");
    }

    let running = engine.running_flag();
    let want_boxes = cli.boxes;
    let started = Instant::now();

    let mut recognition = tokio::task::spawn_blocking(move || {
        let text = engine.get_recognition_result();
        let boxes = if want_boxes { engine.text_boxes() } else { Vec::new() };
        (text, boxes)
    });

    let (text, boxes) = loop {
        tokio::select! {
            result = &mut recognition => break result?,
            _ = tokio::time::sleep(poll_interval) => {
                if running.is_running() {
                    log::info!("Recognition running for {:?}", started.elapsed());
                }
            }
        }
    };
    log::info!("OCR took {:?}", started.elapsed());

    if want_boxes {
        println!("{}", serde_json::to_string_pretty(&Recognition { text, boxes })?);
    } else {
        println!("{}", text);
    }

    Ok(())
}
