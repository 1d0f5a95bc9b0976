use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rutero_api::{app, AppState};
use rutero_reservation::{HoldExpirySweeper, ReservationEngine};
use rutero_schedule::{ExpansionEngine, TripFactory};
use rutero_store::{
    DbClient, PgRouteTemplateRepository, PgSeatLayoutRepository, PgSeatRepository,
    PgTripRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rutero_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = rutero_store::app_config::Config::load()?;
    tracing::info!("Starting Rutero API on port {}", config.server.port);

    let operating_zone: chrono_tz::Tz = config
        .scheduling
        .operating_timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid operating_timezone: {e}"))?;

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let routes = Arc::new(PgRouteTemplateRepository {
        pool: db.pool.clone(),
    });
    let layouts = Arc::new(PgSeatLayoutRepository {
        pool: db.pool.clone(),
    });
    let trips = Arc::new(PgTripRepository {
        pool: db.pool.clone(),
    });
    let seats = Arc::new(PgSeatRepository {
        pool: db.pool.clone(),
    });

    let factory = TripFactory::new(
        trips.clone(),
        seats.clone(),
        layouts.clone(),
        operating_zone,
    );
    let state = AppState {
        routes: routes.clone(),
        expansion: Arc::new(ExpansionEngine::new(routes, factory)),
        reservations: Arc::new(ReservationEngine::new(
            trips,
            seats.clone(),
            config.business_rules.default_hold_minutes,
        )),
        sweeper: Arc::new(HoldExpirySweeper::new(seats)),
        operating_zone,
    };

    tokio::spawn(rutero_api::worker::start_hold_sweeper(
        state.clone(),
        Duration::from_secs(config.scheduling.sweep_interval_seconds),
    ));
    tokio::spawn(rutero_api::worker::start_generation_worker(
        state.clone(),
        Duration::from_secs(config.scheduling.generation_interval_seconds),
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
