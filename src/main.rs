use acoustic_trigger::config::SamplerSource;
use acoustic_trigger::{
    bind_listener, create_router, dispatch_notifications, AnalogSampler, AppState, AudioFile,
    Calibrator, Clock, Config, EventPipeline, IioSampler, LogNotifier, NatsClient, NatsNotifier,
    Notifier, PipelineShared, ShutdownGuard, StatusMessage, SystemClock, WavSampler, WavStore,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "acoustic-trigger")]
#[command(about = "Sound-triggered audio capture")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/acoustic-trigger")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Calibrate, then detect and capture events until interrupted
    Run,
    /// Measure and print the DC offset, then exit
    Calibrate,
    /// Print details of a stored recording
    Inspect {
        /// WAV file to inspect
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(Config::load(&args.config)?).await,
        Command::Calibrate => calibrate(Config::load(&args.config)?),
        Command::Inspect { file } => inspect(&file),
    }
}

fn open_sampler(cfg: &Config) -> Result<Box<dyn AnalogSampler>> {
    let bits = cfg.sampler.resolution_bits;
    match cfg.sampler.source {
        SamplerSource::Iio => Ok(Box::new(IioSampler::open(&cfg.sampler.iio_path, bits)?)),
        SamplerSource::Wav => {
            let path = cfg
                .sampler
                .wav_path
                .as_deref()
                .context("sampler.wav_path not set")?;
            Ok(Box::new(WavSampler::open(path, bits)?))
        }
    }
}

async fn run(cfg: Config) -> Result<()> {
    let device_id = cfg.device_id();

    info!("Acoustic Trigger v{}", env!("CARGO_PKG_VERSION"));
    info!("Device: {}", device_id);

    // Fatal initialization: sampler, storage and the HTTP port must all come up
    // before the detection thread exists
    let sampler = open_sampler(&cfg).context("Failed to initialize analog input")?;
    let store = WavStore::new(cfg.recordings_dir(), device_id.clone())
        .context("Failed to initialize storage")?
        .with_max_recordings(cfg.storage.max_recordings);

    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = bind_listener(&addr).await?;

    let shared = Arc::new(PipelineShared::new(device_id.clone()));
    let pipeline_config = cfg.pipeline();

    // Notification channel: pipeline thread -> dispatcher task
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();

    let nats_client = if cfg.nats.enabled {
        match NatsClient::connect(&cfg.nats.url, &cfg.nats.subject_prefix, device_id.clone()).await
        {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("NATS unavailable, events will only be logged: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let notifier: Arc<dyn Notifier> = match &nats_client {
        Some(client) => Arc::new(NatsNotifier::new(Arc::clone(client))),
        None => Arc::new(LogNotifier),
    };

    let dispatcher = tokio::spawn(dispatch_notifications(
        notice_rx,
        notifier,
        Arc::clone(&shared),
    ));

    let mut pipeline = EventPipeline::new(
        pipeline_config.clone(),
        sampler,
        Box::new(SystemClock::new()),
        Box::new(store.clone()),
        Arc::clone(&shared),
    )
    .with_notifications(notice_tx);

    // Calibrate before anything else competes for the input
    let (mut pipeline, offset) = tokio::task::spawn_blocking(move || {
        let offset = pipeline.start()?;
        Ok::<_, anyhow::Error>((pipeline, offset))
    })
    .await
    .context("Calibration task panicked")??;

    if let Some(client) = &nats_client {
        let status = StatusMessage {
            device_id: device_id.clone(),
            status: "online".to_string(),
            dc_offset: Some(offset),
            threshold: pipeline_config.threshold,
            timestamp: SystemClock::new().now_utc().to_rfc3339(),
        };
        if let Err(e) = client.publish_status(&status).await {
            warn!("Failed to announce status: {:#}", e);
        }
    }

    // Detection loop gets its own blocking thread; capture spins for seconds.
    // The guard stops it on every return path out of this function.
    let shutdown = ShutdownGuard::new(Arc::new(AtomicBool::new(false)));
    let pipeline_shutdown = shutdown.flag();
    let pipeline_task = tokio::task::spawn_blocking(move || pipeline.run(&pipeline_shutdown));

    let state = AppState::new(
        Arc::clone(&shared),
        Arc::new(store),
        pipeline_config.capture,
        pipeline_config.threshold,
    );
    let app = create_router(state);

    info!("HTTP server listening on {}", addr);

    let http_shutdown = shutdown.flag();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            http_shutdown.store(true, Ordering::SeqCst);
        })
        .await
        .context("HTTP server failed")?;

    drop(shutdown);

    match pipeline_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Pipeline stopped with error: {:#}", e),
        Err(e) => error!("Pipeline task panicked: {}", e),
    }

    // Pipeline dropped its sender; dispatcher drains and exits
    if let Err(e) = dispatcher.await {
        error!("Notification dispatcher panicked: {}", e);
    }

    let stats = shared.stats();
    info!(
        "Captured {} events ({} capture failures, {} storage failures, {} notification failures)",
        stats.events_captured, stats.capture_failures, stats.store_failures, stats.notify_failures
    );

    Ok(())
}

fn calibrate(cfg: Config) -> Result<()> {
    let mut sampler = open_sampler(&cfg).context("Failed to initialize analog input")?;
    let calibrator = Calibrator::new(
        cfg.capture.calibration_samples,
        cfg.capture.calibration_delay_us,
    );

    let offset = calibrator.calibrate(sampler.as_mut(), &SystemClock::new());

    println!("DC offset: {}", offset);
    println!(
        "Trigger band: {}..={} (threshold {})",
        offset.saturating_sub(cfg.capture.threshold),
        offset.saturating_add(cfg.capture.threshold),
        cfg.capture.threshold
    );

    Ok(())
}

fn inspect(file: &str) -> Result<()> {
    let audio = AudioFile::open(file)?;

    println!("File: {}", audio.path);
    println!("Duration: {:.3} seconds", audio.duration_seconds);
    println!("Sample rate: {} Hz", audio.sample_rate);
    println!("Channels: {}", audio.channels);
    println!("Samples: {}", audio.samples.len());
    println!("Peak: {}", audio.peak());

    Ok(())
}
