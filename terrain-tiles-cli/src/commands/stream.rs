//! Stream command - run the engine along a straight pan and report progress.
//!
//! The camera flies east over an RD point at a fixed height, looking ahead
//! and down. Every frame calls [`TilesRenderer::update`]; afterwards the
//! command waits for outstanding fetches and prints the final statistics.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Vector3;
use terrain_tiles::config::ConfigFile;
use terrain_tiles::coord::wgs84_to_rd;
use terrain_tiles::fetch::{HttpClient, ReqwestClient};
use terrain_tiles::renderer::RendererStats;
use terrain_tiles::scene::TileLayer;
use terrain_tiles::{Camera, TilesRenderer};

use super::common::{resolve_matrix_set, runtime, BasemapArgs};
use crate::error::CliError;

/// Arguments for the stream command.
pub struct StreamArgs {
    pub basemap: BasemapArgs,
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
    pub frames: u32,
    pub speed: f64,
    pub frame_ms: u64,
    pub settle_timeout: u64,
}

/// Run the stream command.
pub fn run(args: &StreamArgs, config: &ConfigFile) -> Result<(), CliError> {
    if !(args.height.is_finite() && args.height > 0.0) {
        return Err(CliError::Config(format!(
            "Camera height must be positive, got {}",
            args.height
        )));
    }
    let center = wgs84_to_rd(args.lat, args.lon)?;
    let scene_center = Vector3::new(center.x, center.y, 0.0);

    println!(
        "Streaming {} over RD ({:.0}, {:.0}) at {} m",
        style(&args.basemap.resolve(config).layer).cyan(),
        center.x,
        center.y,
        args.height
    );

    runtime()?.block_on(stream(args, config, scene_center))
}

async fn stream(args: &StreamArgs, config: &ConfigFile, scene_center: Vector3<f64>) -> Result<(), CliError> {
    let options = args.basemap.resolve(config);
    let client = Arc::new(ReqwestClient::new()?);
    let matrix_set = resolve_matrix_set(&args.basemap, &options, config, &client).await?;

    let client: Arc<dyn HttpClient> = client;
    let mut renderer = TilesRenderer::wmts(&options, matrix_set, client, config.renderer)?;

    let progress = ProgressBar::new(u64::from(args.frames));
    progress.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} frames {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let frame = Duration::from_millis(args.frame_ms);
    for index in 0..args.frames {
        let camera = pan_camera(args, index);
        renderer.update(&scene_center, &camera)?;

        let stats = renderer.stats();
        tracing::debug!(
            frame = index,
            level = ?stats.tile_level,
            active = stats.active_tiles,
            in_flight = stats.in_flight,
            queued = stats.queued,
            loaded = stats.loaded,
            "Frame"
        );
        progress.set_message(summary(&stats));
        progress.inc(1);
        tokio::time::sleep(frame).await;
    }
    progress.finish_and_clear();

    let last = pan_camera(args, args.frames.saturating_sub(1));
    settle(&mut renderer, args.settle_timeout).await?;
    // One more frame lets the engine clean up tiles of superseded levels
    renderer.update(&scene_center, &last)?;
    settle(&mut renderer, args.settle_timeout).await?;

    let stats = renderer.stats();
    println!("{} {}", style("Settled:").green().bold(), summary(&stats));
    println!(
        "  placeholders: {}, stale: {}, current: {}",
        renderer.group().count(TileLayer::Placeholder),
        renderer.group().count(TileLayer::Stale),
        renderer.group().count(TileLayer::Current)
    );

    renderer.dispose();
    Ok(())
}

async fn settle(renderer: &mut TilesRenderer, timeout_secs: u64) -> Result<(), CliError> {
    let drained = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
        while renderer.next_completion().await {}
    })
    .await;
    drained.map_err(|_| CliError::Timeout(timeout_secs))
}

/// Camera for frame `index`: centered on the pan, `height` up, looking ahead.
pub fn pan_camera(args: &StreamArgs, index: u32) -> Camera {
    let start = -args.speed * f64::from(args.frames) / 2.0;
    let x = start + args.speed * f64::from(index);
    let position = Vector3::new(x, -args.height, args.height);
    let target = Vector3::new(x, 0.0, 0.0);
    Camera::looking_at(position, target, 45.0, (1280.0, 720.0))
}

fn summary(stats: &RendererStats) -> String {
    let level = stats
        .tile_level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "level {} | {} active | {} in flight | {} queued | {} loaded",
        level, stats.active_tiles, stats.in_flight, stats.queued, stats.loaded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> StreamArgs {
        StreamArgs {
            basemap: BasemapArgs::default(),
            lat: 52.3731,
            lon: 4.8926,
            height: 500.0,
            frames: 100,
            speed: 20.0,
            frame_ms: 0,
            settle_timeout: 1,
        }
    }

    #[test]
    fn test_pan_is_centered_on_target() {
        let args = args();
        let first = pan_camera(&args, 0);
        let middle = pan_camera(&args, 50);

        assert_eq!(first.position.x, -1000.0);
        assert_eq!(middle.position.x, 0.0);
        assert_eq!(middle.position.z, 500.0);
        assert!(middle.direction.z < 0.0);
    }

    #[test]
    fn test_invalid_height_is_config_error() {
        let mut args = args();
        args.height = 0.0;
        let err = run(&args, &ConfigFile::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn test_point_outside_rd_is_config_error() {
        let mut args = args();
        args.lat = 10.0;
        let err = run(&args, &ConfigFile::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn test_summary_without_level() {
        let text = summary(&RendererStats::default());
        assert!(text.starts_with("level - |"));
    }
}
