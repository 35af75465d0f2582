use std::{process, sync::Arc};

use ampwatch::{
    config::{site::SiteConfig, Settings},
    core::{sensor::SampleSource, supervisor::Supervisor},
    logger::LoggerManager,
    print_error,
};
use clap::Parser;
use tracing::{error, info};

/// RMS current sampling daemon with a Prometheus-style /metrics endpoint.
#[derive(Parser, Debug)]
#[command(name = "ampwatch", version)]
struct Cli {
    /// Enable verbose diagnostic output.
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(feature = "hardware")]
fn sample_source(settings: &Settings) -> Arc<dyn SampleSource> {
    use ampwatch::core::sensor::ads1115::Ads1115Source;

    info!(
        device = %settings.sampling.i2c_device.display(),
        address = settings.sampling.i2c_address,
        "using ADS1115 sample source"
    );
    Arc::new(Ads1115Source::new(
        settings.sampling.i2c_device.clone(),
        settings.sampling.i2c_address,
    ))
}

#[cfg(not(feature = "hardware"))]
fn sample_source(_settings: &Settings) -> Arc<dyn SampleSource> {
    use ampwatch::core::sensor::sim::SimulatedSource;

    info!("hardware feature disabled, using simulated sample source");
    Arc::new(SimulatedSource::default())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = Settings::load().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });
    if cli.verbose {
        settings.logger.level = "debug".to_string();
    }

    let mut logger_manager = LoggerManager::new(settings.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to set up logging: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to initialize logging: {}", e);
        process::exit(1);
    });
    info!("Starting ampwatch version {}...", env!("CARGO_PKG_VERSION"));

    let site = SiteConfig::load_or_create(&settings.sampling.properties_path).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    info!(
        point = %site.point,
        system0 = %site.system0,
        system1 = %site.system1,
        "site labels loaded"
    );

    let source = sample_source(&settings);
    let supervisor = Supervisor::new(settings, site, source);

    if let Err(e) = supervisor.run().await {
        error!("{e}");
        process::exit(1);
    }
    info!("ampwatch shut down cleanly");
}
