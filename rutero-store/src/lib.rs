pub mod app_config;
pub mod database;
pub mod memory;
pub mod route_repo;
pub mod seat_repo;
pub mod trip_repo;

pub use database::DbClient;

pub(crate) fn db_err(err: sqlx::Error) -> rutero_core::repository::StoreError {
    rutero_core::repository::StoreError::Backend(err.to_string())
}

pub(crate) fn json_err(err: serde_json::Error) -> rutero_core::repository::StoreError {
    rutero_core::repository::StoreError::Backend(format!("json decode: {err}"))
}
pub use memory::MemoryStore;
pub use route_repo::{PgRouteTemplateRepository, PgSeatLayoutRepository};
pub use seat_repo::PgSeatRepository;
pub use trip_repo::PgTripRepository;
