//! Mock timetable source for testing without API access.
//!
//! Serves a scripted reply (payload, HTTP failure, empty body, optionally
//! delayed) and records how often and with what it was called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::coordinator::TimetableSource;

use super::error::FetchError;
use super::query::QueryParameters;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A successful, decoded response.
    Payload(Value),
    /// A non-success HTTP status.
    Status { status: u16, message: String },
    /// A 2xx response with an empty body.
    Empty,
    /// Wait, then answer with the inner reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    /// Wrap this reply so it arrives after `delay`.
    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

/// Mock source that serves a scripted reply.
#[derive(Debug)]
pub struct MockTimetableSource {
    reply: Mutex<MockReply>,
    calls: AtomicUsize,
    last_query: Mutex<Option<QueryParameters>>,
}

impl MockTimetableSource {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Mock that answers every call with `payload`.
    pub fn with_payload(payload: Value) -> Self {
        Self::new(MockReply::Payload(payload))
    }

    /// Change the reply served to subsequent calls.
    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
    }

    /// Number of fetches started so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Query of the most recent fetch.
    pub fn last_query(&self) -> Option<QueryParameters> {
        self.last_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TimetableSource for MockTimetableSource {
    async fn fetch(&self, query: &QueryParameters) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(query.clone());

        let mut reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        loop {
            match reply {
                MockReply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                MockReply::Payload(value) => return Ok(value),
                MockReply::Status { status, message } => {
                    return Err(FetchError::from_status(status, message));
                }
                MockReply::Empty => return Err(FetchError::EmptyBody),
            }
        }
    }
}
