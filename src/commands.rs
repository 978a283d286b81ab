use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

use voice_sampler::audio::AudioBackendFactory;
use voice_sampler::config::Config;
use voice_sampler::http::{create_router, AppState};
use voice_sampler::session::{
    ChannelObserver, Completion, RecordingSessionManager, SessionEvent, RECORDING_CEILING_SECS,
};
use voice_sampler::synthesis::{SynthesisClient, SynthesisRequest};

const METER_WIDTH: usize = 30;
const GENERATED_FILE_NAME: &str = "generated_voice.wav";

pub struct RecordArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub text: Option<String>,
    pub output_generated: Option<PathBuf>,
}

/// Record one sample, save it, and optionally synthesize speech from it
pub async fn record(config: &Config, args: RecordArgs) -> Result<()> {
    let source = config.audio.source(args.input)?;
    let backend = AudioBackendFactory::create(source, config.backend_config())?;
    info!("Backend created: {}", backend.name());

    let (observer, mut channels) = ChannelObserver::new();
    let manager =
        RecordingSessionManager::new(backend, Box::new(observer), config.session_config());
    let (recorder, task) = manager.spawn();

    recorder.start().await?;
    println!(
        "Recording... speak now ({}s max, Ctrl+C to stop early)",
        RECORDING_CEILING_SECS
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;
    let mut elapsed = 0;

    let completion: Completion = loop {
        tokio::select! {
            event = channels.events.recv() => match event {
                Some(SessionEvent::Tick { elapsed_secs }) => {
                    elapsed = elapsed_secs;
                    draw_progress(elapsed, channels.frames.borrow().level());
                }
                Some(SessionEvent::Completed(completion)) => break completion,
                Some(SessionEvent::Cleared) => {}
                None => bail!("Recorder stopped before the session completed"),
            },
            Ok(()) = channels.frames.changed() => {
                draw_progress(elapsed, channels.frames.borrow().level());
            }
            result = &mut ctrl_c, if !stopping => {
                result.context("Failed to listen for Ctrl+C")?;
                stopping = true;
                recorder.stop().await?;
            }
        }
    };
    println!();

    if completion.reason.is_fault() {
        warn!("Recording ended early: {:?}", completion.reason);
    }

    let Some(artifact) = completion.into_artifact() else {
        bail!("No audio was captured");
    };

    let output_dir = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.audio.recordings_path));
    let path = artifact.save_wav(&output_dir)?;
    println!(
        "Saved {:.1}s voice sample to {}",
        artifact.duration_secs(),
        path.display()
    );

    if let Some(text) = args.text {
        let client = SynthesisClient::from_config(&config.synthesis)?;
        let request = SynthesisRequest::new(artifact, &text, config.synthesis.max_text_length)?;

        println!("Generating voice...");
        let audio = client.generate(&request).await?;

        let target = args
            .output_generated
            .unwrap_or_else(|| output_dir.join(GENERATED_FILE_NAME));
        audio.save(&target)?;
        println!("Saved generated voice to {}", target.display());
    }

    drop(recorder);
    task.await.context("Session task panicked")?;
    Ok(())
}

/// Run the HTTP control API until Ctrl+C
pub async fn serve(config: &Config) -> Result<()> {
    let source = config.audio.source(None)?;
    let backend = AudioBackendFactory::create(source, config.backend_config())?;

    let (observer, channels) = ChannelObserver::new();
    let manager =
        RecordingSessionManager::new(backend, Box::new(observer), config.session_config());
    let (recorder, task) = manager.spawn();

    let mut events = channels.events;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let SessionEvent::Completed(completion) = event {
                info!(
                    "Session {} finished ({:?}, {})",
                    completion.session_id,
                    completion.reason,
                    if completion.is_no_data() { "no data" } else { "artifact held" }
                );
            }
        }
    });

    let synthesis = SynthesisClient::from_config(&config.synthesis)?;
    let state = AppState::new(
        recorder,
        channels.frames,
        synthesis,
        config.synthesis.max_text_length,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("{} listening on {}", config.service.name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    // The router owned the last handle; the loop shuts the session down
    task.await.context("Session task panicked")?;
    Ok(())
}

/// Print the voice-cloning service status and limits
pub async fn health(config: &Config) -> Result<()> {
    let client = SynthesisClient::from_config(&config.synthesis)?;

    let health = client.health().await?;
    println!("Service:  {} ({})", client.endpoint(), health.status);
    println!("Device:   {}", health.device);

    let server = client.server_config().await?;
    println!("Model:    {}", server.model);
    println!("Max text: {} characters", server.max_text_length);
    Ok(())
}

fn draw_progress(elapsed: u32, level: f32) {
    let remaining = RECORDING_CEILING_SECS.saturating_sub(elapsed);
    let filled = ((level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize).min(METER_WIDTH);
    print!(
        "\r  {} : {}  [{}{}]",
        format_clock(elapsed),
        format_clock(remaining),
        "#".repeat(filled),
        " ".repeat(METER_WIDTH - filled)
    );
    let _ = std::io::stdout().flush();
}

fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
