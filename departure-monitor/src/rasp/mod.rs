//! Timetable search API (Yandex Raspisanie) client.
//!
//! Key characteristics of the upstream:
//! - One `GET` per search, authenticated by an opaque key in `Authorization`
//! - Responses carry a top-level `segments` array; each segment has an
//!   ISO 8601 `departure` with offset and `from`/`to` records with a `title`
//! - Nested records may be a single object or a list depending on how many
//!   there are, so everything is normalized before use

mod client;
mod error;
pub mod mock;
mod query;
mod types;

pub use client::{DEFAULT_BASE_URL, RaspClient, RaspConfig, decode_body};
pub use error::FetchError;
pub use query::{DEFAULT_LANG, DEFAULT_TRANSPORT_TYPES, FORMAT_JSON, QueryParameters};
pub use types::{
    CallingPoint, CallingPointList, DestinationBoard, DestinationRecord, OneOrMany,
    SegmentRecord, ServiceDetail, ServiceRecord, SubsequentCallingPoints, TitledRecord,
};
