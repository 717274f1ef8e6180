//! Queue session release state machine.
//!
//! Every `(event, client)` pair owns one [`types::QueueSession`] whose phase
//! advances strictly `Waiting → Releasing → Released`. The transitions live
//! in a pure reducer; the runtime store executes the effects it returns:
//!
//! ```text
//! Enter            → session created, entry persisted (best effort)
//! Tick             → drain position recomputed from the wall clock;
//!                    at zero, a capacity slot is requested
//! ReleaseStarted   → Waiting → Releasing, grace delay scheduled
//! CompleteRelease  → Releasing → Released, release persisted,
//!                    admission token minted
//! AdmissionGranted → minted token recorded on the session
//! ```
//!
//! The phase guards on `ReleaseStarted` and `CompleteRelease` make the
//! release hand-off exactly-once even when a delayed action and a tick
//! race, and positions are never stored, so a session rebuilt after a
//! restart resumes at the position the wall clock implies.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod types;

pub use actions::QueueAction;
pub use environment::QueueSessionEnvironment;
pub use reducer::QueueSessionReducer;
pub use types::SessionsState;
