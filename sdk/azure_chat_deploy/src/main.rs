use azure_chat_deploy::ProcessManifest;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr; stdout carries the manifest.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    match ProcessManifest::from_env().and_then(|manifest| manifest.to_json()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to build process manifest");
            ExitCode::FAILURE
        }
    }
}
