//! # Hype Queue Testing
//!
//! Testing utilities for the hype-queue admission engine.
//!
//! This crate provides:
//! - [`ReducerTest`]: a Given-When-Then harness for reducers
//! - Effect assertion helpers
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//!
//! The release state machine is time-driven (drain decay, grace window,
//! lease deadlines), so almost every meaningful test needs a clock it can
//! control. `ManualClock` is shared: cloning it yields a handle advancing
//! the same underlying instant, which lets a test move time forward while
//! an engine under test keeps reading it.

pub mod mocks;
pub mod reducer_test;

pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
