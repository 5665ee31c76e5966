use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info, warn};
use tryon_overlay::anchor::AnchorResolver;
use tryon_overlay::bridge::{HostBridge, HostChannel, QueueChannel, StdoutChannel};
use tryon_overlay::camera::OpenCvCamera;
use tryon_overlay::config::{Config, Transport};
use tryon_overlay::error::{PipelineError, Severity};
use tryon_overlay::logging;
use tryon_overlay::pose::MoveNetDetector;
use tryon_overlay::protocol;
use tryon_overlay::render::{GarmentSprite, LayerCompositor, NoPreview, Presenter, PreviewWindow};
use tryon_overlay::scheduler::{FrameLoop, LoopExit};

const CONFIG_PATH: &str = "config.toml";
const HANDOFF_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let (config, load_error) = Config::load_or_default(&config_path);

    let log_path = logging::init(&config.log)?;
    info!("=== tryon {} ===", env!("GIT_VERSION"));
    info!("Log: {}", log_path.display());
    if let Some(e) = load_error {
        warn!("config {config_path} not loaded ({e:#}), using defaults");
    }

    match config.bridge.transport {
        Transport::Stdout => run(&config, HostBridge::new(StdoutChannel::new())).await,
        Transport::Tcp => {
            let listener = TcpListener::bind(config.bridge.addr.as_str())
                .await
                .with_context(|| format!("failed to bind host bridge on {}", config.bridge.addr))?;
            let (tx, rx) = unbounded_channel();
            let server = tokio::spawn(async move {
                if let Err(e) = protocol::serve_host(listener, rx).await {
                    error!("Host bridge stopped: {e:#}");
                }
            });

            let result = run(&config, HostBridge::new(QueueChannel::new(tx))).await;
            // 未送信のイベントをホストが受け取るまで少しだけ待つ
            match tokio::time::timeout(HANDOFF_TIMEOUT, server).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Host bridge task failed: {e}"),
                Err(_) => warn!("No host collected pending events within {}s", HANDOFF_TIMEOUT.as_secs()),
            }
            result
        }
    }
}

async fn run<C: HostChannel>(config: &Config, mut bridge: HostBridge<C>) -> Result<()> {
    let detector = match MoveNetDetector::from_config(&config.detector) {
        Ok(detector) => detector,
        Err(e) => {
            let err = PipelineError::ModelLoad {
                detail: format!("{e:#}"),
            };
            bridge.report(&err);
            return Err(e.context(err.to_string()));
        }
    };
    info!("Model: {}", config.detector.model);

    let garment = match GarmentSprite::load(&config.compositor.garment) {
        Ok(sprite) => {
            let (w, h) = sprite.dimensions();
            info!("Garment: {} ({}x{})", config.compositor.garment, w, h);
            Some(sprite)
        }
        Err(e) => {
            bridge.report(&e);
            if e.severity() == Severity::Fatal {
                return Err(e.into());
            }
            None
        }
    };

    let presenter: Box<dyn Presenter> = if config.debug.view {
        Box::new(PreviewWindow::new("Try-On Preview"))
    } else {
        Box::new(NoPreview)
    };

    let mut frame_loop = FrameLoop::new(
        OpenCvCamera::from_config(&config.camera),
        detector,
        AnchorResolver::from_config(&config.anchor),
        LayerCompositor::new(&config.compositor, garment),
        bridge,
        presenter,
    );

    let stop = frame_loop.control().stop_flag();
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop)?;

    match frame_loop.start().await {
        LoopExit::CameraFailed => bail!("camera stream failed"),
        LoopExit::Fatal => bail!("frame loop stopped on a fatal error"),
        exit => {
            info!("Shutting down ({exit:?})");
            Ok(())
        }
    }
}
