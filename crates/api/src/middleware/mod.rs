//! Request middleware and the extractors that read what it records.
//!
//! - [`request_time::stamp_request_time`] -- Records when a request arrived.
//! - [`request_time::RequestTime`] -- Extracts that arrival time in handlers.

pub mod request_time;
