//! The per-frame pipeline loop.
//!
//! One cycle: read frame → await detector → validate → resolve anchor → hold
//! policy → composite → `poseData` → present. The detector await is the only
//! suspension point inside a cycle; the loop yields to the runtime between
//! cycles and checks for a stop request before scheduling the next one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, info};

use crate::anchor::{Anchor, AnchorResolver, HoldPolicy};
use crate::bridge::{HostBridge, HostChannel};
use crate::camera::FrameSource;
use crate::error::{PipelineError, Severity};
use crate::pose::{DetectionResult, Detector};
use crate::render::{CompositeFrame, LayerCompositor, Presenter};

/// Shared run/stop flags of a [`FrameLoop`].
///
/// Clones refer to the same loop. Only atomics, so the stop flag can be handed
/// to a signal handler.
#[derive(Debug, Clone, Default)]
pub struct LoopControl {
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl LoopControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次のサイクルの前に停止する（実行中のサイクルは最後まで走る）
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// For `signal_hook::flag::register`.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// `false` if the loop was already running.
    fn acquire(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    fn release(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Why [`FrameLoop::start`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Another `start` owns the loop; nothing was done.
    AlreadyRunning,
    Stopped,
    CameraFailed,
    PresenterClosed,
    /// Any other fatal pipeline error.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Composited,
    /// No frame was available.
    Skipped,
    /// An `error` event was emitted for this frame.
    Failed,
    Halt(LoopExit),
}

/// One second of loop throughput.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub fps: f32,
    /// Mean landmark visibility over frames with a subject.
    pub visibility: Option<f32>,
}

/// フレームレート計測（1秒ごとに集計）
#[derive(Debug)]
pub struct LoopStats {
    frames: u32,
    tracked: u32,
    visibility_sum: f32,
    timer: Instant,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            frames: 0,
            tracked: 0,
            visibility_sum: 0.0,
            timer: now,
        }
    }

    pub fn record(&mut self, visibility: Option<f32>) -> Option<Throughput> {
        self.record_at(Instant::now(), visibility)
    }

    fn record_at(&mut self, now: Instant, visibility: Option<f32>) -> Option<Throughput> {
        self.frames += 1;
        if let Some(v) = visibility {
            self.tracked += 1;
            self.visibility_sum += v;
        }

        let elapsed = now.duration_since(self.timer);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let summary = Throughput {
            fps: self.frames as f32 / elapsed.as_secs_f32(),
            visibility: (self.tracked > 0).then(|| self.visibility_sum / self.tracked as f32),
        };
        *self = Self::starting_at(now);
        Some(summary)
    }
}

impl Default for LoopStats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FrameLoop<S, D, C, P> {
    source: S,
    detector: D,
    resolver: AnchorResolver,
    compositor: LayerCompositor,
    bridge: HostBridge<C>,
    presenter: P,
    control: LoopControl,
    hold: HoldPolicy,
    stats: LoopStats,
    playing: bool,
    last_composite: Option<CompositeFrame>,
}

impl<S, D, C, P> FrameLoop<S, D, C, P>
where
    S: FrameSource,
    D: Detector,
    C: HostChannel,
    P: Presenter,
{
    pub fn new(
        source: S,
        detector: D,
        resolver: AnchorResolver,
        compositor: LayerCompositor,
        bridge: HostBridge<C>,
        presenter: P,
    ) -> Self {
        Self {
            source,
            detector,
            resolver,
            compositor,
            bridge,
            presenter,
            control: LoopControl::new(),
            hold: HoldPolicy::new(),
            stats: LoopStats::new(),
            playing: false,
            last_composite: None,
        }
    }

    /// Shares run/stop flags with other holders of `control`.
    pub fn with_control(mut self, control: LoopControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> LoopControl {
        self.control.clone()
    }

    pub fn bridge(&self) -> &HostBridge<C> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut HostBridge<C> {
        &mut self.bridge
    }

    pub fn hold_policy(&self) -> &HoldPolicy {
        &self.hold
    }

    pub fn last_composite(&self) -> Option<&CompositeFrame> {
        self.last_composite.as_ref()
    }

    /// Runs cycles until stopped, the camera fails or the presenter closes.
    pub async fn start(&mut self) -> LoopExit {
        if !self.control.acquire() {
            debug!("frame loop already running");
            return LoopExit::AlreadyRunning;
        }

        self.bridge.status("Pose engine ready");
        let exit = match self.source.start().map_err(PipelineError::from) {
            Ok(()) => {
                self.bridge.status("Camera stream acquired");
                self.run().await
            }
            Err(err) => match self.fail(err) {
                CycleOutcome::Halt(exit) => exit,
                _ => self.run().await,
            },
        };

        self.source.stop();
        self.playing = false;
        self.hold.reset();
        self.control.release();
        info!("Frame loop exited: {exit:?}");
        exit
    }

    async fn run(&mut self) -> LoopExit {
        loop {
            if self.control.stop_requested() {
                return LoopExit::Stopped;
            }
            if let CycleOutcome::Halt(exit) = self.cycle().await {
                return exit;
            }
            tokio::task::yield_now().await;
        }
    }

    /// One pass of the pipeline. Per-frame failures become `error` events.
    pub async fn cycle(&mut self) -> CycleOutcome {
        let frame = match self.source.read_frame().map_err(PipelineError::from) {
            Ok(frame) => frame,
            // 空フレームは報告せずに次のサイクルへ
            Err(err) if err.severity() == Severity::Transient => {
                debug!("skipping cycle: {err}");
                return CycleOutcome::Skipped;
            }
            Err(err) => return self.fail(err),
        };
        if !self.playing {
            self.playing = true;
            self.bridge.status("Camera playing");
        }

        let detection = match AssertUnwindSafe(self.detector.detect(frame)).catch_unwind().await {
            Ok(Ok(detection)) => detection,
            Ok(Err(e)) => {
                return self.fail(PipelineError::Detection {
                    detail: format!("{e:#}"),
                })
            }
            Err(payload) => return self.fail(PipelineError::from_panic(payload)),
        };
        if let Err(e) = detection.validate() {
            return self.fail(e);
        }

        // 合成に成功したフレームの配置だけを保持する
        let composite = match panic::catch_unwind(AssertUnwindSafe(|| self.render(&detection))) {
            Ok((anchor, composite)) => {
                self.hold.apply(anchor);
                composite
            }
            Err(payload) => return self.fail(PipelineError::from_panic(payload)),
        };

        let landmarks = detection.landmarks();
        self.bridge.pose_data(landmarks);

        let visibility = (!landmarks.is_empty()).then(|| landmarks.average_visibility());
        if let Some(t) = self.stats.record(visibility) {
            match t.visibility {
                Some(v) => info!("FPS: {:.1}, visibility: {:.2}", t.fps, v),
                None => info!("FPS: {:.1}, no subject", t.fps),
            }
        }

        let presented = match panic::catch_unwind(AssertUnwindSafe(|| self.presenter.present(&composite))) {
            Ok(open) => open,
            Err(payload) => {
                self.last_composite = Some(composite);
                return self.fail(PipelineError::from_panic(payload));
            }
        };
        self.last_composite = Some(composite);
        if !presented {
            return CycleOutcome::Halt(LoopExit::PresenterClosed);
        }
        CycleOutcome::Composited
    }

    fn render(&self, detection: &DetectionResult) -> (Anchor, CompositeFrame) {
        let (width, height) = detection.dimensions();
        let anchor = self.resolver.resolve(detection.landmarks(), width, height);
        let transform = self.hold.peek(anchor);
        (anchor, self.compositor.compose(detection, transform.as_ref()))
    }

    /// Reports `err`; fatal errors end the loop.
    fn fail(&mut self, err: PipelineError) -> CycleOutcome {
        self.bridge.report(&err);
        match (err.severity(), &err) {
            (Severity::Transient, _) => CycleOutcome::Failed,
            (Severity::Fatal, PipelineError::Camera(_)) => CycleOutcome::Halt(LoopExit::CameraFailed),
            (Severity::Fatal, _) => CycleOutcome::Halt(LoopExit::Fatal),
        }
    }
}
