//! NWA Worker - processing job messages from a STOMP broker
//!
//! A [`Worker`] subscribes to an inbound queue and runs every message through
//! a handler. Messages are JSON objects carrying `subscription_id`, `job_id`,
//! `step_id` and `payload`.

pub mod broker;
pub mod error;
pub mod frame;
pub mod worker;

pub use broker::{Broker, Mailbox, Message};
pub use error::StompError;
pub use frame::Frame;
pub use worker::{JobMeta, ShutdownHandle, Worker, WorkerStats, parse_message};
