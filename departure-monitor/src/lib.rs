//! Next-departure monitor for a suburban rail route.
//!
//! Polls a timetable search API for one origin/destination pair, keeps the
//! latest response, and answers: "when does the next train leave, and where
//! does it stop?"

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod rasp;
pub mod store;
pub mod web;
