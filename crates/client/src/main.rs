//! Headless intake client binary
//!
//! Connects to the realtime proxy and runs one intake interview end to
//! end. Audio capture is wired in by the embedding host; run standalone
//! this drives the session from server events alone.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use voice_intake_client::session::intake_instructions;
use voice_intake_client::{IntakeApiClient, NoCsrfToken, SessionController, StaticCsrfToken};
use voice_intake_client::http::CsrfTokenProvider;
use voice_intake_config::constants::session::RECOVERY_KEY;
use voice_intake_config::{load_settings, Settings};
use voice_intake_core::{NoopAudioOutput, NoopUi};
use voice_intake_persistence::FileRecoveryStore;

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.observability.log_level.clone()));
    if settings.observability.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_name = env::var("VOICE_INTAKE_ENV").ok();
    let settings =
        load_settings(env_name.as_deref()).context("failed to load configuration")?;
    init_tracing(&settings);
    tracing::info!(environment = ?settings.environment, "starting voice intake client");

    let csrf: Arc<dyn CsrfTokenProvider> = match env::var("VOICE_INTAKE_CSRF_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(StaticCsrfToken(token)),
        _ => Arc::new(NoCsrfToken),
    };
    let api = Arc::new(IntakeApiClient::new(settings.server.api_base.clone(), csrf));

    let recovery = Arc::new(FileRecoveryStore::new(
        &settings.session.recovery_dir,
        RECOVERY_KEY,
    ));

    // The embedding host owns the capture device; the channel stays open
    // but idle in the headless binary
    let (_capture_tx, capture_rx) = mpsc::channel(32);

    let mut controller = SessionController::new(
        settings,
        intake_instructions(),
        capture_rx,
        Arc::new(NoopUi),
        Arc::new(NoopAudioOutput),
        recovery,
        Some(api),
    );

    tokio::select! {
        result = controller.start() => {
            result.context("session ended with an error")?;
            tracing::info!("session complete");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            controller.stop();
        }
    }

    Ok(())
}
