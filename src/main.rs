use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use native_guard::config::{load_config, validate_config, Config};

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("loading configuration")?;
    validate_config(&config).context("validating configuration")?;
    init_logging(&config);

    info!("Starting native-guard v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(not(windows))]
    {
        anyhow::bail!("native-guard only supports the Windows platform");
    }

    #[cfg(windows)]
    {
        use native_guard::process::inspect_processes;
        use native_guard::run_blocking;

        info!("Architecture: {}", std::env::consts::ARCH);
        let report = run_blocking(move || inspect_processes(&config))
            .await
            .context("inspecting processes")?;
        info!(
            processes = report.processes.len(),
            failures = report.failures,
            "inspection finished"
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
