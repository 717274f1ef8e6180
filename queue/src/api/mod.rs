//! HTTP API endpoints for the queue service.
//!
//! - [`queue`]: client-facing entry, status polling and heartbeat
//! - [`admission`]: token consumption and checkout completion for the
//!   purchase flow
//! - [`admin`]: queue configuration and preview reset

pub mod admin;
pub mod admission;
pub mod queue;
