use std::path::PathBuf;

use crate::encode::{EncoderConfig, EncoderSession, FinishReport};
use crate::foundation::core::{FrameBuffer, RenderTarget};
use crate::foundation::error::{EncodeError, PanimError, PanimResult};
use crate::playback::present::{Presenter, write_png};
use crate::plugin::abi::Tick;
use crate::plugin::host::{PluginHost, ReloadReport};
use crate::plugin::source::ModuleLoader;

/// Requests from the outside world, at most one action each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Hot-reload the plugin module from its path.
    Reload,
    TogglePause,
    /// Enter offline mode and stream frames to the encoder.
    StartRender,
    /// Abort the offline render.
    Cancel,
    /// Reset the animation clock.
    Reset,
    /// Save one frame at render resolution as PNG.
    Capture,
    /// Save the last presented viewport frame as PNG.
    Screenshot,
}

/// Current top-level mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    Interactive,
    Offline,
}

/// Spawns encoder sessions for offline renders.
pub trait EncoderLauncher {
    fn launch(&mut self, target: RenderTarget) -> Result<EncoderSession, EncodeError>;
}

impl EncoderLauncher for EncoderConfig {
    fn launch(&mut self, target: RenderTarget) -> Result<EncoderSession, EncodeError> {
        EncoderSession::start(self, target)
    }
}

/// Something that happened during one tick.
#[derive(Debug)]
pub enum TickEvent {
    Reloaded(ReloadReport),
    /// The reload failed and the previous module stays active.
    ReloadFailed(PanimError),
    /// A reload was requested while rendering offline and ignored.
    ReloadRejected,
    Paused(bool),
    Reset,
    Captured(PathBuf),
    CaptureFailed(PanimError),
    RenderStarted(RenderTarget),
    /// The encoder could not be started; still interactive.
    RenderFailedToStart(EncodeError),
    FrameSent(u64),
    /// The offline render ended, successfully or not. Back to interactive.
    RenderFinished(Result<FinishReport, EncodeError>),
}

/// Outcome of [`PlaybackController::tick`].
#[derive(Debug)]
pub struct TickReport {
    /// Mode after the tick.
    pub mode: PlaybackMode,
    pub events: Vec<TickEvent>,
}

impl TickReport {
    fn new(mode: PlaybackMode) -> Self {
        Self {
            mode,
            events: Vec::new(),
        }
    }

    /// The render result if the offline render ended during this tick.
    pub fn render_result(&self) -> Option<&Result<FinishReport, EncodeError>> {
        self.events.iter().find_map(|e| match e {
            TickEvent::RenderFinished(r) => Some(r),
            _ => None,
        })
    }
}

/// Options for [`PlaybackController`].
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerOpts {
    /// Resolution and frame rate of offline renders and captures.
    pub render: RenderTarget,
    /// PNG path for [`ControlEvent::Capture`].
    pub capture_path: PathBuf,
    /// PNG path for [`ControlEvent::Screenshot`].
    pub screenshot_path: PathBuf,
    /// End an offline render normally after this many frames even if the module is not finished.
    pub frame_limit: Option<u64>,
}

impl Default for ControllerOpts {
    fn default() -> Self {
        Self {
            render: RenderTarget::default(),
            capture_path: PathBuf::from("capture.png"),
            screenshot_path: PathBuf::from("screenshot.png"),
            frame_limit: None,
        }
    }
}

enum Mode {
    Interactive,
    Offline(EncoderSession),
}

/// Drives the plugin, presenter and encoder one tick at a time.
///
/// Everything runs on the caller's thread. Mode switches, reloads and cancellation are only
/// observed between ticks.
pub struct PlaybackController<L: ModuleLoader, P: Presenter, E: EncoderLauncher> {
    host: PluginHost<L>,
    presenter: P,
    launcher: E,
    opts: ControllerOpts,
    mode: Mode,
    paused: bool,
    viewport_frame: FrameBuffer,
    render_frame: FrameBuffer,
}

impl<L: ModuleLoader, P: Presenter, E: EncoderLauncher> PlaybackController<L, P, E> {
    pub fn new(host: PluginHost<L>, presenter: P, launcher: E, opts: ControllerOpts) -> Self {
        Self {
            host,
            presenter,
            launcher,
            render_frame: FrameBuffer::new(0, 0),
            viewport_frame: FrameBuffer::new(0, 0),
            opts,
            mode: Mode::Interactive,
            paused: false,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        match self.mode {
            Mode::Interactive => PlaybackMode::Interactive,
            Mode::Offline(_) => PlaybackMode::Offline,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn host(&self) -> &PluginHost<L> {
        &self.host
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// The live encoder session, if rendering offline.
    pub fn session(&self) -> Option<&EncoderSession> {
        match &self.mode {
            Mode::Offline(session) => Some(session),
            Mode::Interactive => None,
        }
    }

    /// Run one tick. `wall_dt` is the real time since the previous tick, used in interactive mode.
    ///
    /// Recoverable failures (reload, encoder start/stream/exit) are reported as [`TickEvent`]s.
    /// An `Err` means the plugin state contract was violated.
    pub fn tick(&mut self, wall_dt: f32, events: &[ControlEvent]) -> PanimResult<TickReport> {
        let mut report = TickReport::new(self.mode());
        match self.mode {
            Mode::Interactive => self.tick_interactive(wall_dt, events, &mut report)?,
            Mode::Offline(_) => self.tick_offline(events, &mut report)?,
        }
        report.mode = self.mode();
        Ok(report)
    }

    fn tick_interactive(
        &mut self,
        wall_dt: f32,
        events: &[ControlEvent],
        report: &mut TickReport,
    ) -> PanimResult<()> {
        if events.contains(&ControlEvent::StartRender) {
            return self.start_render(report);
        }

        for event in events {
            match event {
                ControlEvent::Reload => match self.host.reload_in_place() {
                    Ok(r) => report.events.push(TickEvent::Reloaded(r)),
                    Err(e) => {
                        tracing::error!(error = %e, "reload failed, keeping previous module");
                        report.events.push(TickEvent::ReloadFailed(e));
                    }
                },
                ControlEvent::TogglePause => {
                    self.paused = !self.paused;
                    report.events.push(TickEvent::Paused(self.paused));
                }
                ControlEvent::Reset => {
                    self.host.reset()?;
                    report.events.push(TickEvent::Reset);
                }
                ControlEvent::Capture => {
                    let dt = if self.paused { 0.0 } else { wall_dt };
                    match self.capture(dt) {
                        Ok(path) => report.events.push(TickEvent::Captured(path)),
                        Err(e @ PanimError::State(_)) => return Err(e),
                        Err(e) => {
                            tracing::error!(error = %e, "capture failed");
                            report.events.push(TickEvent::CaptureFailed(e));
                        }
                    }
                }
                ControlEvent::Screenshot => match self.screenshot() {
                    Ok(path) => report.events.push(TickEvent::Captured(path)),
                    Err(e) => {
                        tracing::error!(error = %e, "screenshot failed");
                        report.events.push(TickEvent::CaptureFailed(e));
                    }
                },
                ControlEvent::Cancel | ControlEvent::StartRender => {}
            }
        }

        let (width, height) = self.presenter.viewport();
        let tick = Tick {
            dt: if self.paused { 0.0 } else { wall_dt },
            width,
            height,
            offline: false,
        };
        self.host.update(tick, &mut self.viewport_frame)?;
        self.presenter.present(&self.viewport_frame)
    }

    fn start_render(&mut self, report: &mut TickReport) -> PanimResult<()> {
        let target = self.opts.render;
        match self.launcher.launch(target) {
            Ok(session) => {
                if let Err(e) = self.host.reset() {
                    tracing::error!(error = %e, "reset before render failed, cancelling encoder");
                    if let Err(finish) = session.finish(true) {
                        tracing::debug!(error = %finish, "cancelled encoder session");
                    }
                    return Err(e);
                }
                self.mode = Mode::Offline(session);
                tracing::info!(
                    width = target.width,
                    height = target.height,
                    fps = target.fps,
                    "offline render started"
                );
                report.events.push(TickEvent::RenderStarted(target));
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start offline render");
                report.events.push(TickEvent::RenderFailedToStart(e));
            }
        }
        Ok(())
    }

    fn tick_offline(&mut self, events: &[ControlEvent], report: &mut TickReport) -> PanimResult<()> {
        if events.contains(&ControlEvent::Reload) {
            tracing::warn!("reload requested during offline render, ignoring");
            report.events.push(TickEvent::ReloadRejected);
        }
        if events.contains(&ControlEvent::Cancel) {
            return self.finish_render(true, report);
        }

        let result = self.stream_frame(report);
        if let Err(e) = &result {
            if matches!(self.mode, Mode::Offline(_)) {
                tracing::error!(error = %e, "offline tick failed, cancelling render");
                if let Err(reset) = self.finish_render(true, report) {
                    tracing::warn!(error = %reset, "reset after failed render also failed");
                }
            }
        }
        result
    }

    fn stream_frame(&mut self, report: &mut TickReport) -> PanimResult<()> {
        let target = self.opts.render;
        let tick = Tick {
            dt: target.delta(),
            width: target.width,
            height: target.height,
            offline: true,
        };
        self.host.update(tick, &mut self.render_frame)?;

        let Mode::Offline(session) = &mut self.mode else {
            return Ok(());
        };
        if let Err(e) = session.send_frame(&self.render_frame) {
            tracing::error!(error = %e, "frame streaming failed, cancelling render");
            return self.finish_render(true, report);
        }
        let sent = session.frames_written();
        report.events.push(TickEvent::FrameSent(sent));
        self.presenter.rendering(sent);

        let limit_reached = self.opts.frame_limit.is_some_and(|limit| sent >= limit);
        if self.host.finished()? || limit_reached {
            return self.finish_render(false, report);
        }
        Ok(())
    }

    fn finish_render(&mut self, cancel: bool, report: &mut TickReport) -> PanimResult<()> {
        let Mode::Offline(session) = std::mem::replace(&mut self.mode, Mode::Interactive) else {
            return Ok(());
        };
        let result = session.finish(cancel);
        match &result {
            Ok(r) => tracing::info!(frames = r.frames_written, "offline render finished"),
            Err(e) => tracing::error!(error = %e, "offline render failed"),
        }
        report.events.push(TickEvent::RenderFinished(result));
        self.host.reset()
    }

    fn capture(&mut self, dt: f32) -> PanimResult<PathBuf> {
        let target = self.opts.render;
        let tick = Tick {
            dt,
            width: target.width,
            height: target.height,
            offline: true,
        };
        self.host.update(tick, &mut self.render_frame)?;
        write_png(&self.render_frame, &self.opts.capture_path)?;
        tracing::info!(path = %self.opts.capture_path.display(), "captured frame");
        Ok(self.opts.capture_path.clone())
    }

    fn screenshot(&self) -> PanimResult<PathBuf> {
        let frame = &self.viewport_frame;
        if frame.as_bytes().is_empty() {
            return Err(PanimError::validation("no frame has been presented yet"));
        }
        write_png(frame, &self.opts.screenshot_path)?;
        tracing::info!(
            path = %self.opts.screenshot_path.display(),
            width = frame.width(),
            height = frame.height(),
            "saved screenshot"
        );
        Ok(self.opts.screenshot_path.clone())
    }
}
