//! Core building blocks for execution event streams.
//!
//! This crate is pure (no I/O, no clocks):
//! - `status` - Execution status, status shadow and admission predicates
//! - `url` - Stream URL construction
//! - `protocol` - Wire messages (`ExecutionMessage`)
//! - `dispatch` - Routing of messages to caller `Callbacks`
//! - `backoff` - Reconnection delay strategies
//! - `validation` - Ready-state, closure and delay classification

pub mod backoff;
pub mod dispatch;
pub mod protocol;
pub mod status;
pub mod url;
pub mod validation;

pub use backoff::{ExponentialBackoff, FixedDelay, LinearBackoff, ReconnectionStrategy};
pub use dispatch::{Callbacks, dispatch};
pub use protocol::{ExecutionMessage, LogEntry, ProtocolError};
pub use status::{ExecutionStatus, SkipReason, StatusShadow};
pub use url::{Origin, build_stream_url};
pub use validation::{CloseEvent, ReadyState};
