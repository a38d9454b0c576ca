use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use wacha_app::config::AppConfig;
use wacha_app::controller::{ControllerConfig, ControllerDeps, ConversationController};
use wacha_app::gate::{GateConfig, WakeAndCommandGate};
use wacha_app::listener::Listener;
use wacha_app::reminder::{ReminderScheduler, ReminderStore};
use wacha_app::remote::RemoteServices;
use wacha_app::session::{ConversationSession, WakeSignal};
use wacha_app::voice::Voice;
use wacha_audio::{
    device, AmbientCalibrator, CaptureEngine, CaptureEngineConfig, CpalFrameSource, CpalSink,
    FrameSource, PlaybackCoordinator,
};
use wacha_foundation::{
    install_dump_signal, install_signal_handlers, real_clock, take_dump_request, ActivityStamp,
    ShutdownToken,
};
use wacha_stt::SpeechRecognizer;
use wacha_tts::SpeechSynthesizer;

#[derive(Parser, Debug)]
#[command(name = "wacha", about = "Voice-driven conversational assistant client")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input device name (overrides config).
    #[arg(long)]
    input_device: Option<String>,

    /// Output device name (overrides config).
    #[arg(long)]
    output_device: Option<String>,

    /// Ambient calibration duration in seconds (overrides config).
    #[arg(long)]
    calibrate_secs: Option<u64>,

    /// Print audio device names and exit.
    #[arg(long)]
    list_devices: bool,
}

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "wacha.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();

    if args.list_devices {
        let (inputs, outputs) = device::device_names();
        println!("Input devices:");
        for name in inputs {
            println!("  {}", name);
        }
        println!("Output devices:");
        for name in outputs {
            println!("  {}", name);
        }
        return Ok(());
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if args.input_device.is_some() {
        config.audio.input_device = args.input_device;
    }
    if args.output_device.is_some() {
        config.audio.output_device = args.output_device;
    }
    if let Some(secs) = args.calibrate_secs {
        config.calibration.duration_secs = secs;
    }

    tracing::info!("Starting wacha");
    let shutdown = ShutdownToken::new();
    install_signal_handlers(shutdown.clone())?;
    install_dump_signal();

    let clock = real_clock();
    let activity = Arc::new(ActivityStamp::new(clock.now()));
    let session = Arc::new(ConversationSession::new(activity.clone()));

    let source: Arc<dyn FrameSource> = Arc::new(CpalFrameSource::new(
        config.audio.input_device.clone(),
        config.audio.sample_rate_hz,
        config.frame_size_samples(),
    ));

    // Calibrate before any listener thread exists, so the microphone is
    // otherwise idle. A device failure here aborts startup.
    let calibrator = AmbientCalibrator::new(config.calibration.margin_db);
    let calibration = calibrator
        .calibrate(
            &*source,
            Duration::from_secs(config.calibration.duration_secs),
        )
        .context("ambient calibration failed")?;

    let remote = Arc::new(RemoteServices::new(config.server.clone())?);
    let recognizer: Arc<dyn SpeechRecognizer> = remote.clone();
    let synthesizer: Arc<dyn SpeechSynthesizer> = remote.clone();

    let playback = Arc::new(PlaybackCoordinator::new(
        Arc::new(CpalSink::new(config.audio.output_device.clone())),
        activity.clone(),
    ));

    let mut endpoint = config.endpoint_config();
    endpoint.threshold_dbfs = calibration.threshold_dbfs;
    let capture = Arc::new(CaptureEngine::new(
        source,
        playback.state(),
        activity.clone(),
        clock.clone(),
        CaptureEngineConfig {
            endpoint,
            min_voiced_frames: config.endpoint.min_voiced_frames,
            ..Default::default()
        },
    ));

    let lexicon = Arc::new(config.lexicon());
    let listener = Arc::new(Listener::new(
        capture,
        recognizer,
        lexicon.clone(),
        config.language.clone(),
    ));
    let voice = Arc::new(Voice::new(
        synthesizer,
        playback.clone(),
        config.tts.rate.clone(),
        config.tts.pitch.clone(),
    ));
    let wake = Arc::new(WakeSignal::new());
    let background_enabled = Arc::new(AtomicBool::new(true));
    let reminders = ReminderStore::new();

    spawn_dump_monitor(session.clone(), background_enabled.clone(), shutdown.clone())?;

    let scheduler = {
        let voice = voice.clone();
        ReminderScheduler::start(
            reminders.clone(),
            Duration::from_secs(config.reminder.poll_secs),
            Box::new(move |text| {
                if let Err(e) = voice.say(text) {
                    tracing::error!("Reminder speech failed: {}", e);
                }
            }),
        )
        .context("failed to start reminder scheduler")?
    };

    let gate = WakeAndCommandGate::new(
        listener.clone(),
        voice.clone(),
        session.clone(),
        wake.clone(),
        lexicon.clone(),
        shutdown.clone(),
        background_enabled.clone(),
        GateConfig {
            silence_timeout_ms: config.gate.silence_timeout_ms,
            post_padding_ms: config.gate.post_padding_ms,
            poll: Duration::from_millis(config.gate.poll_ms),
            retry_backoff: Duration::from_millis(config.gate.retry_backoff_ms),
        },
    );
    let gate_handle = gate.start()?;

    let controller = ConversationController::new(
        ControllerDeps {
            session,
            listener,
            voice: voice.clone(),
            backend: remote.clone(),
            executor: remote,
            reminders,
            wake,
            lexicon,
            background_enabled,
            shutdown,
            clock,
        },
        config.phrases.clone(),
        ControllerConfig {
            idle_timeout: config.idle_timeout(),
            ..Default::default()
        },
    );
    controller.run();

    tracing::info!("Shutting down");
    gate_handle.stop();
    scheduler.stop();
    playback.stop();
    tracing::info!("Goodbye");
    Ok(())
}

/// SIGUSR1 handler surface: the signal only flips a flag, this thread does
/// the logging.
fn spawn_dump_monitor(
    session: Arc<ConversationSession>,
    background_enabled: Arc<AtomicBool>,
    shutdown: ShutdownToken,
) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("debug-dump".into())
        .spawn(move || {
            while !shutdown.is_requested() {
                if take_dump_request() {
                    tracing::info!(
                        session = %session.snapshot(),
                        background_enabled = background_enabled.load(Ordering::SeqCst),
                        "State dump (SIGUSR1)"
                    );
                }
                std::thread::sleep(Duration::from_millis(500));
            }
        })
        .context("failed to spawn dump monitor")?;
    Ok(())
}
