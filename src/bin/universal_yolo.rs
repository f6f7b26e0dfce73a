// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn, Level};

use universal_yolo::{
    input::collect_images, renderer, Args, Detection, ProcessorConfig, UniversalYoloProcessor,
};

/// detections.json 中的单张图片记录
#[derive(Serialize)]
struct ImageRecord {
    image: PathBuf,
    detections: Vec<Detection>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    info!("模型文件路径: {}", args.model.display());
    info!("类别文件路径: {}", args.labels.display());
    info!("输入来源: {}", args.source.display());

    let mut processor = UniversalYoloProcessor::new(ProcessorConfig::from(&args))
        .context("failed to build processor")?;

    let images = collect_images(&args.source)?;
    if images.is_empty() {
        warn!("no images found in {}", args.source.display());
    }

    let output = args.output_dir();
    let font = match &args.font {
        Some(path) => Some(renderer::load_font(path)?),
        None => None,
    };

    let t_all = Instant::now();
    let (mut ok, mut failed) = (0usize, 0usize);
    let mut records = Vec::new();
    for path in &images {
        let t = Instant::now();
        let ys = match processor.process(path) {
            Ok(ys) => ys,
            Err(e) if e.is_recoverable() => {
                warn!("skip {}: {:#}", path.display(), anyhow::Error::from(e));
                failed += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        ok += 1;

        info!(
            "{} -> {} detections ({:?})",
            path.display(),
            ys.len(),
            t.elapsed()
        );
        for y in &ys {
            info!("  {}", y);
        }

        if !args.no_draw {
            if let Some(name) = path.file_name() {
                if let Err(e) = renderer::draw_detections(path, &ys, output.join(name), font.as_ref())
                {
                    error!("failed to draw {}: {:#}", path.display(), e);
                }
            }
        }

        if args.json {
            records.push(ImageRecord {
                image: path.clone(),
                detections: ys,
            });
        }
    }

    if args.json {
        std::fs::create_dir_all(&output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let f = output.join("detections.json");
        let text = serde_json::to_string_pretty(&records)?;
        std::fs::write(&f, text).with_context(|| format!("failed to write {}", f.display()))?;
        info!("saved {}", f.display());
    }

    processor.dispose()?;

    info!(
        "done: {} ok, {} failed, total {:?}{}",
        ok,
        failed,
        t_all.elapsed(),
        if args.no_draw {
            String::new()
        } else {
            format!(", results saved to {}", output.display())
        }
    );
    Ok(())
}
