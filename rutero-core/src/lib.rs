pub mod error;
pub mod layout;
pub mod repository;
pub mod route;
pub mod seat;
pub mod trip;

pub use error::{CoreError, CoreResult};
pub use layout::{DeckPlan, SeatLayout};
pub use route::{ExceptionKind, RecurrenceRule, RouteStop, RouteTemplate, ScheduleException};
pub use seat::{PassengerBinding, Seat, SeatStatus};
pub use trip::{StopDeparture, TripInstance};
