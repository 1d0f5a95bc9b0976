pub mod engine;
pub mod sweeper;

pub use engine::{ReservationEngine, ReserveRequest};
pub use sweeper::HoldExpirySweeper;
