use anyhow::{Context, Result};
use clap::Parser;
use color_barcode::{
    load_image, Cli, FrameSource, Mode, Pipeline, Progress, RenderConfig, Renderer, Stage,
    VideoDecoder,
};
use log::{debug, error, info};

/// Log progress roughly every tenth of a stage
fn progress_logger() -> impl FnMut(&Progress) {
    let mut last_step = None;
    move |progress: &Progress| match progress.total {
        Some(total) if total > 0 => {
            let step = progress.done * 10 / total;
            if last_step != Some((progress.stage, step)) {
                last_step = Some((progress.stage, step));
                info!(
                    "{:?}: {}/{} ({}%)",
                    progress.stage,
                    progress.done,
                    total,
                    step * 10
                );
            }
        }
        _ => {
            if progress.stage == Stage::Reading && progress.done % 1000 == 0 {
                info!("{:?}: {} frames", progress.stage, progress.done);
            }
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments; an unknown mode prints usage and exits
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    info!("Starting {} v{}", color_barcode::PACKAGE_NAME, color_barcode::VERSION);

    let config = cli.build_config().context("Invalid configuration")?;
    let renderer = Renderer::new(RenderConfig::from_config(&config)?);
    let output = cli.output_path();
    let height = config.strip_height;

    let mut pipeline = Pipeline::new(config);
    if atty::is(atty::Stream::Stderr) {
        pipeline = pipeline.with_progress(progress_logger());
    }

    match cli.mode {
        Mode::Movie => {
            info!("Reading movie: {}", cli.path.display());
            let mut decoder = VideoDecoder::new(&cli.path).context("Could not open movie")?;

            let (width, height_px) = decoder.dimensions();
            info!(
                "Video info: {}x{}, {:.2} FPS, {:.2}s duration, {:?} frames",
                width,
                height_px,
                decoder.fps(),
                decoder.duration(),
                decoder.frame_count()
            );

            let strip = pipeline
                .movie_barcode(&mut decoder)
                .context("Failed to generate barcode")?;
            debug!("Decoded {} frames", decoder.frames_decoded());

            renderer.write_barcode(&strip.render(height), &output)?;
        }
        Mode::Scene => {
            info!("Reading scene: {}", cli.path.display());
            let scene = load_image(&cli.path).context("Could not open scene")?;

            let (palette, strip) = pipeline
                .scene_palette(&scene)
                .context("Failed to find primary colors")?;
            for entry in &palette {
                debug!("{:?} {:.2}%", entry.color.0, entry.weight * 100.0);
            }

            renderer.write_scene(&scene, &strip.render(height), &output)?;
        }
    }

    info!("Done");
    Ok(())
}
