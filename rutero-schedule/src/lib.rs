pub mod calendar;
pub mod expansion;
pub mod factory;

pub use expansion::{DateError, ExpansionEngine, GenerationSummary, RouteExpansionReport};
pub use factory::{TripFactory, TripOutcome};
