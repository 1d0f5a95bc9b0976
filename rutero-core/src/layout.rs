use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One deck of a bus: a rectangular grid of seat codes. Empty cells are
/// aisles or gaps and produce no seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckPlan {
    pub floor: i16,
    pub seat_type: Option<String>,
    pub seat_map: Vec<Vec<String>>,
}

impl DeckPlan {
    pub fn seat_codes(&self) -> impl Iterator<Item = &str> {
        self.seat_map
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }
}

/// Seat layout template, supplied by the fleet collaborator. Trips snapshot
/// a reference to the layout used when their seats were materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLayout {
    pub id: Uuid,
    pub name: String,
    pub decks: Vec<DeckPlan>,
}

impl SeatLayout {
    pub fn capacity(&self) -> usize {
        self.decks.iter().map(|d| d.seat_codes().count()).sum()
    }
}
