// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nudge integration tests.
//!
//! Provides mock adapters and a harness that wires a full engine around them,
//! so tests run fast and deterministically without external services.
//!
//! # Components
//!
//! - [`MockBackend`] - AI backend with scripted results and a call counter
//! - [`MockChannel`] - Messaging channel that captures sends and can be told to fail
//! - [`TestHarness`] - Engine, store, queue, and mode switch around the mocks

pub mod harness;
pub mod mock_backend;
pub mod mock_channel;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_backend::MockBackend;
pub use mock_channel::{MockChannel, SentMessage};
