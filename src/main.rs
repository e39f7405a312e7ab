use anyhow::Result;
use obolus::cache::TariffCache;
use obolus::config::Config;
use obolus::esit::{EsitClient, ScheduleSource};
use obolus::poller::PollerSet;
use obolus::sensor::{LogSink, SensorReporter};
use obolus::web::{self, AppState};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    obolus::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Obolus tariff engine {} starting up", env!("APP_VERSION"));

    let tz = config.tz().map_err(|e| anyhow::anyhow!("{}", e))?;
    let cache = Arc::new(TariffCache::new(&config.tariffs.types));
    let source: Arc<dyn ScheduleSource> = Arc::new(
        EsitClient::from_config(&config.api)
            .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?,
    );

    // One poller task per tariff type, plus the sensor reporter on the same
    // shutdown signal
    let pollers = PollerSet::spawn(source, Arc::clone(&cache), &config, tz);
    let reporter = SensorReporter::new(
        Arc::clone(&cache),
        config.clone(),
        tz,
        Arc::new(LogSink::new()),
    );
    let reporter_task = tokio::spawn(reporter.run(pollers.shutdown_signal()));

    let web_state = AppState {
        cache,
        config: Arc::new(config.clone()),
        tz,
    };
    let host = config.web.host.clone();
    let port = config.web.port;
    let web_task = tokio::spawn(async move {
        if let Err(e) = web::serve(web_state, &host, port).await {
            error!("Web server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    pollers.shutdown().await;
    let _ = reporter_task.await;
    // The web server runs until the process stops
    web_task.abort();

    info!("Shutdown complete");
    Ok(())
}
