#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use vowsession::{RestBackend, ServiceContainer, VowSettings, VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Restore (or establish) a session and print the resolved user
///
/// Returns `Ok(false)` when no user could be materialized.
///
/// # Errors
///
/// Returns an error if:
/// - Settings cannot be loaded
/// - The backend client cannot be configured
/// - Signing in with `VOWSESSION_EMAIL`/`VOWSESSION_PASSWORD` fails
async fn run() -> anyhow::Result<bool> {
    // Also loads the .env file and initializes the logger
    let settings = VowSettings::load().map_err(|e| anyhow::anyhow!("Failed to load settings: {e}"))?;

    let backend = Arc::new(
        RestBackend::new(&settings.backend).context("Failed to configure backend client")?,
    );

    if let (Ok(email), Ok(password)) = (
        std::env::var("VOWSESSION_EMAIL"),
        std::env::var("VOWSESSION_PASSWORD"),
    ) {
        backend
            .sign_in_with_password(&email, &password)
            .await
            .context("Sign-in failed")?;
    }

    let container = ServiceContainer::new(settings, backend);
    print_startup_info(&container);

    let orchestrator = container.orchestrator();
    let user = orchestrator.restore_session().await;
    orchestrator.cleanup();

    match user {
        Some(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(true)
        }
        None => {
            println!("✗ No active session - sign-in required");
            Ok(false)
        }
    }
}

fn print_startup_info(container: &ServiceContainer) {
    println!("🚀 vowsession {VERSION}");
    println!("   {}", container.summary());
    println!("   Tab {}", container.orchestrator().tab_id());
}
