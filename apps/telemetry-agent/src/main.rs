use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use telemetry_agent::app::{ShutdownReason, Supervisor};
use telemetry_agent::config::Config;
use telemetry_agent::source::SourceAdapter;

const EXIT_SUCCESS: u8 = 0;
const EXIT_INIT_FAILURE: u8 = 1;
const EXIT_RUNTIME_FAILURE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            // Logging isn't initialized yet (its own level comes from this
            // same config), so a load failure goes straight to stderr.
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_INIT_FAILURE);
        }
    };

    init_logging(&config.logging.level);

    info!(version = env!("CARGO_PKG_VERSION"), "telemetry agent starting");

    let source = match build_source(&config).await {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "failed to initialize source adapter");
            return ExitCode::from(EXIT_INIT_FAILURE);
        }
    };

    let supervisor = Supervisor::new(config, source);

    match supervisor.run().await {
        Ok(ShutdownReason::Requested) => ExitCode::from(EXIT_SUCCESS),
        Ok(ShutdownReason::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(err) => {
            error!(error = %err, "supervisor exited with an error");
            ExitCode::from(EXIT_RUNTIME_FAILURE)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase().replace("warning", "warn").replace("critical", "error")));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(true)
        .init();
}

/// Builds the concrete `SourceAdapter` and opens it. Without the `live`
/// feature only replay/mock data is available; `--config` selects a replay
/// file via `source.replay_file`.
async fn build_source(config: &Config) -> anyhow::Result<Arc<dyn SourceAdapter>> {
    #[cfg(feature = "live")]
    {
        use telemetry_agent::source::PitwallAdapter;

        let mut adapter = PitwallAdapter::new(telemetry_agent::source::PitwallSourceConfig {
            replay_file: config.source.replay_file.clone(),
            playback_speed: 1.0,
        });
        // `open` needs `&mut self`; done once here, before the adapter is
        // shared behind an `Arc` for the samplers.
        adapter.open().await?;
        return Ok(Arc::new(adapter));
    }

    #[cfg(not(feature = "live"))]
    {
        let _ = config;
        info!("`live` feature disabled, using the in-memory mock source adapter");
        let mut adapter = telemetry_agent::source::MockAdapter::new();
        adapter.open().await?;
        Ok(Arc::new(adapter))
    }
}
