//! Domain types for the departure monitor.
//!
//! Types here enforce their invariants at construction time, so code that
//! receives them can trust their validity.

mod station;

pub use station::{InvalidStationCode, StationCode};
