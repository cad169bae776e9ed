// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-core: domain model and shared abstractions for the gantry
//! job-orchestration platform.

pub mod macros;

pub mod clock;
pub mod entity;
pub mod execution;
pub mod fleet;
pub mod id;
pub mod job;
pub mod serde_support;
pub mod system;
pub mod user;
pub mod validate;

pub use clock::{Clock, FakeClock, SystemClock};
pub use entity::Entity;
pub use execution::{
    CancellationEvent, CancellationEventId, Execution, ExecutionErrorKind, ExecutionId,
    ExecutionState, TriggerEvent, TriggerEventId,
};
pub use fleet::{
    ExecutionServer, ExecutionServerId, SchedulerState, SchedulerStateId, WorkerThread,
    WorkerThreadId, HEARTBEAT_INTERVAL, STALE_AFTER,
};
pub use job::{Job, JobId, JobSpec, Schedule, ScheduleId, Tag, Task, TaskId};
pub use system::{ConfigItem, ConfigItemId, System, SystemId};
pub use user::{User, UserId};
pub use validate::{trim, trim_casefold, InvalidState, ValidationIssue};
