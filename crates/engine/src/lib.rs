// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-engine: scheduling and execution core.
//!
//! An [`server::ExecutionHost`] owns the in-process [`queue::JobQueue`],
//! a pool of [`worker::Worker`]s, the heartbeat and recovery loops, and
//! (when elected leader) the [`scheduler::Scheduler`] loop.

pub mod actions;
pub mod api;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod server;
pub mod worker;

pub use actions::{Action, ActionContext, ActionError, ActionRegistry};
pub use api::TriggerApi;
pub use error::EngineError;
pub use queue::{JobQueue, DEFAULT_QUEUE_CAPACITY, POP_TIMEOUT};
pub use scheduler::{next_fire_time, Scheduler, SCHEDULER_TICK};
pub use server::{ExecutionHost, HostConfig};
pub use worker::Worker;
