//! Departure store and the normalized timetable it is built on.
//!
//! The store keeps the last successful payload verbatim and derives the
//! "next departure" projection from it on demand.

mod departures;
mod timetable;

pub use departures::{DepartureStore, NO_DEPARTURE_LABEL, StoreState, StoreView};
pub use timetable::{Destination, Segment, Service, Timetable, parse_timestamp};
