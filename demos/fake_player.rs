//! Headless renderer demo.
//!
//! Brings a session up against the real service with a discarding audio
//! sink and prints track changes. The credential is read from the
//! environment, standing in for the zeroconf login flow:
//!
//! ```sh
//! CASTLINE_IDENTITY=alice CASTLINE_TOKEN=base64ish-token \
//!     RUST_LOG=castline=debug cargo run --example fake_player
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use castline::{AudioFormat, Credential, NullSink, PlayerSettings, SessionOrchestrator, WsConnector};

#[tokio::main]
async fn main() -> castline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let identity = std::env::var("CASTLINE_IDENTITY").unwrap_or_else(|_| "demo".to_string());
    let token = std::env::var("CASTLINE_TOKEN")
        .map(|t| t.into_bytes())
        .unwrap_or_default();

    let mut options = HashMap::new();
    options.insert("receiverName".to_string(), "Castline Demo".to_string());
    options.insert("audioBitrate".to_string(), "160".to_string());
    let settings = PlayerSettings::from_options(&options)?;

    let (orchestrator, mut events) =
        SessionOrchestrator::new(settings, Arc::new(WsConnector), Arc::new(NullSink));

    orchestrator
        .credential_ready(Credential::new(identity, token, AudioFormat::Low))
        .await;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down");
            orchestrator.shutdown().await;
        }
        _ = async {
            while let Some(track) = events.recv().await {
                println!("Now playing: {} - {} ({})", track.artist, track.title, track.album);
            }
        } => {}
    }

    Ok(())
}
