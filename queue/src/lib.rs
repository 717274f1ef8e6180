//! Hype Queue - a virtual waiting room for high-demand on-sales.
//!
//! When a popular event goes on sale, the storefront cannot let every
//! arriving browser hit checkout at once. This crate gates arrivals
//! behind a queue: each client gets a position that drains to zero
//! against the wall clock, and release into the purchase flow is bounded
//! by venue capacity and proven by a single-use admission token.
//!
//! # Architecture
//!
//! ```text
//! Client                        Server
//! ──────                        ──────
//! enter ──────────────────────▶ window check ─▶ position allocation
//!                                    │
//! status polling ◀───────────── session reducer (Waiting)
//!   (poller: retries,                │ drain hits zero (wall clock)
//!    no phase regression,            ▼
//!    drain interpolation)       admission coordinator (capacity slots)
//!                                    │ slot granted
//!                                    ▼
//!                               Releasing ── grace window ──▶ Released
//!                                    │
//!                                    ▼
//!                               token minted (single use, short TTL)
//!                                    │
//! checkout ──────────────────▶  consume token ─▶ purchase flow
//! ```
//!
//! The release state machine is a pure reducer ([`session`]); the engine
//! ([`engine`]) orchestrates it together with the window check, the
//! allocator, the coordinator, token storage and durable client state.
//! Positions are never stored: they derive from entry time, so a session
//! rebuilt after a restart resumes exactly where the wall clock says.

pub mod allocator;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod drain;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod narrator;
pub mod poller;
pub mod server;
pub mod session;
pub mod state_store;
pub mod tokens;
pub mod types;
pub mod window;

pub use config::{Config, ConfigRegistry};
pub use engine::{QueueEngine, QueueSnapshot};
pub use error::{QueueError, Result};
pub use types::{
    AdmissionToken, ClientId, EventId, EventQueueConfig, QueueCopy, QueuePhase, QueueSession,
    QueueWindow,
};
