use std::{
    io::BufRead as _,
    path::PathBuf,
    sync::mpsc::{self, Receiver, TryRecvError},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use panim::{
    ControlEvent, DylibLoader, HeadlessPresenter, HostConfig, PlaybackController, PlaybackMode,
    PluginHost, TickEvent, TickReport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "panim", version)]
struct Cli {
    /// Plugin shared library to host.
    plugin: PathBuf,

    /// Host configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render offline right away and exit when the render ends.
    #[arg(long)]
    render: bool,

    /// Output video path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Render width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Render height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Render frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Stop offline renders after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// More logging (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

enum Input {
    Control(ControlEvent),
    Quit,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = load_config(&cli)?;
    let loader = match &cfg.shadow_dir {
        Some(dir) => DylibLoader::new(dir),
        None => DylibLoader::default(),
    };
    loader.cleanup_stale_shadows();

    let host = PluginHost::load(loader, &cli.plugin)
        .with_context(|| format!("load plugin '{}'", cli.plugin.display()))?;
    let presenter = HeadlessPresenter::new(cfg.viewport.width, cfg.viewport.height);
    let mut controller =
        PlaybackController::new(host, presenter, cfg.encoder.clone(), cfg.controller_opts());

    if cli.render {
        run_render(&mut controller)?;
        eprintln!("wrote {}", cfg.encoder.out_path.display());
        return Ok(());
    }
    run_interactive(&mut controller, cfg.tick_rate)
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn load_config(cli: &Cli) -> anyhow::Result<HostConfig> {
    let mut cfg = match &cli.config {
        Some(path) => HostConfig::from_path(path)?,
        None => HostConfig::default(),
    };
    if let Some(out) = &cli.out {
        cfg.encoder.out_path = out.clone();
    }
    if let Some(width) = cli.width {
        cfg.render.width = width;
    }
    if let Some(height) = cli.height {
        cfg.render.height = height;
    }
    if let Some(fps) = cli.fps {
        cfg.render.fps = fps;
    }
    if cli.max_frames.is_some() {
        cfg.frame_limit = cli.max_frames;
    }
    cfg.validate()?;
    Ok(cfg)
}

type Controller = PlaybackController<DylibLoader, HeadlessPresenter, panim::EncoderConfig>;

fn run_render(controller: &mut Controller) -> anyhow::Result<()> {
    let report = controller.tick(0.0, &[ControlEvent::StartRender])?;
    log_report(&report);
    for event in &report.events {
        if let TickEvent::RenderFailedToStart(e) = event {
            anyhow::bail!("failed to start render: {e}");
        }
    }

    let started = Instant::now();
    loop {
        let report = controller.tick(0.0, &[])?;
        log_report(&report);
        if let Some(result) = report.render_result() {
            let finished = result
                .as_ref()
                .map_err(|e| anyhow::anyhow!("render failed: {e}"))?;
            tracing::info!(
                frames = finished.frames_written,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "render complete"
            );
            return Ok(());
        }
        if report.mode == PlaybackMode::Interactive {
            anyhow::bail!("render ended without a result");
        }
    }
}

fn run_interactive(controller: &mut Controller, tick_rate: u32) -> anyhow::Result<()> {
    let commands = spawn_stdin_reader();
    let period = Duration::from_secs_f64(1.0 / f64::from(tick_rate));
    eprintln!(
        "commands: reload (h), pause (space), render (r), cancel (esc), reset (b), capture (c), \
         screenshot (s), quit (q)"
    );

    let mut last = Instant::now();
    loop {
        let mut events = Vec::new();
        loop {
            match commands.try_recv() {
                Ok(Input::Control(event)) => events.push(event),
                Ok(Input::Quit) | Err(TryRecvError::Disconnected) => {
                    return shutdown(controller);
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let now = Instant::now();
        let wall_dt = now.duration_since(last).as_secs_f32();
        last = now;

        let report = controller.tick(wall_dt, &events)?;
        log_report(&report);

        // Offline frames are produced as fast as the encoder accepts them.
        if report.mode == PlaybackMode::Interactive {
            let spent = now.elapsed();
            if spent < period {
                std::thread::sleep(period - spent);
            }
        }
    }
}

fn shutdown(controller: &mut Controller) -> anyhow::Result<()> {
    if controller.mode() == PlaybackMode::Offline {
        let report = controller.tick(0.0, &[ControlEvent::Cancel])?;
        log_report(&report);
    }
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_command(&line) {
                Some(input) => {
                    let quit = matches!(input, Input::Quit);
                    if tx.send(input).is_err() || quit {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!(command = %line.trim(), "unknown command"),
            }
        }
    });
    rx
}

fn parse_command(line: &str) -> Option<Input> {
    let event = match line.trim().to_ascii_lowercase().as_str() {
        "reload" | "h" => ControlEvent::Reload,
        "pause" | "space" => ControlEvent::TogglePause,
        "render" | "r" => ControlEvent::StartRender,
        "cancel" | "esc" => ControlEvent::Cancel,
        "reset" | "b" => ControlEvent::Reset,
        "capture" | "c" => ControlEvent::Capture,
        "screenshot" | "s" => ControlEvent::Screenshot,
        "quit" | "q" => return Some(Input::Quit),
        _ => return None,
    };
    Some(Input::Control(event))
}

fn log_report(report: &TickReport) {
    for event in &report.events {
        match event {
            TickEvent::Reloaded(r) => eprintln!(
                "reloaded (generation {}, state {} -> {} bytes)",
                r.generation, r.migration.from_len, r.migration.to_len
            ),
            TickEvent::ReloadFailed(e) => eprintln!("reload failed: {e}"),
            TickEvent::ReloadRejected => eprintln!("reload ignored while rendering"),
            TickEvent::Paused(true) => eprintln!("paused"),
            TickEvent::Paused(false) => eprintln!("resumed"),
            TickEvent::Reset => eprintln!("reset"),
            TickEvent::Captured(path) => eprintln!("wrote {}", path.display()),
            TickEvent::CaptureFailed(e) => eprintln!("capture failed: {e}"),
            TickEvent::RenderStarted(t) => {
                eprintln!("rendering {}x{} @ {} fps", t.width, t.height, t.fps)
            }
            TickEvent::RenderFailedToStart(e) => eprintln!("render failed to start: {e}"),
            TickEvent::FrameSent(n) => tracing::trace!(frames = n, "frame sent"),
            TickEvent::RenderFinished(Ok(r)) => {
                eprintln!("render finished ({} frames)", r.frames_written)
            }
            TickEvent::RenderFinished(Err(e)) => eprintln!("render ended: {e}"),
        }
    }
}
