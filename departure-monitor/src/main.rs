use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use departure_monitor::config::MonitorConfig;
use departure_monitor::coordinator::{RequestCoordinator, TimetableSource};
use departure_monitor::rasp::RaspClient;
use departure_monitor::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "departure_monitor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "departure monitor stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = MonitorConfig::from_env()?;

    let client = RaspClient::new(config.rasp_config())?;
    let coordinator = Arc::new(RequestCoordinator::with_system_clock(
        client,
        config.coordinator_config(),
    ));

    tokio::spawn(poll(Arc::clone(&coordinator), config.refresh_interval));

    let app = create_router(AppState::new(coordinator));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(
        addr = %config.listen_addr,
        from = %config.origin,
        to = %config.destination,
        "departure monitor listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Refresh once per tick. The first tick fires immediately.
async fn poll<S: TimetableSource>(coordinator: Arc<RequestCoordinator<S>>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let outcome = coordinator.refresh().await;
        if outcome.is_update() {
            let view = coordinator
                .store()
                .view(coordinator.config().destination.as_str())
                .await;
            info!(
                departure = %view.departure_time,
                state = ?view.state,
                "departures refreshed"
            );
        }
    }
}
