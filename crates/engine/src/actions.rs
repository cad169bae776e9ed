// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action handlers invoked by workers, looked up by `task.action`.
//!
//! The handler contract lives outside the execution core: the registry is
//! injected into the host, and a handler that wants to be interruptible
//! observes the shutdown token passed in its context. Cancellation events
//! never interrupt an in-flight handler.

use async_trait::async_trait;
use gantry_core::{ExecutionId, JobSpec, Task};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure reported by an action handler; recorded on the Execution, never
/// thrown past the state machine.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Context handed to a handler for one task invocation.
pub struct ActionContext {
    pub execution_id: ExecutionId,
    /// The job snapshot the execution runs against.
    pub job: JobSpec,
    pub task: Task,
    /// Process shutdown signal; handlers may observe it to stop early.
    pub shutdown: CancellationToken,
}

#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, ctx: &ActionContext) -> Result<(), ActionError>;
}

/// Named handler lookup; action names are matched casefolded.
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self { actions: HashMap::new() }
    }

    /// Registry with the built-in handlers (`noop`, `sleep`, `fail`).
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("noop", Arc::new(NoopAction));
        registry.register("sleep", Arc::new(SleepAction));
        registry.register("fail", Arc::new(FailAction));
        registry
    }

    pub fn register(&mut self, name: &str, action: Arc<dyn Action>) {
        self.actions.insert(name.trim().to_lowercase(), action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(&name.trim().to_lowercase()).cloned()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Does nothing, successfully.
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    async fn run(&self, _ctx: &ActionContext) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Sleeps for the number of milliseconds in the task's `name` (default 1000).
pub struct SleepAction;

#[async_trait]
impl Action for SleepAction {
    async fn run(&self, ctx: &ActionContext) -> Result<(), ActionError> {
        let millis = ctx
            .task
            .name
            .as_deref()
            .and_then(|name| name.trim().parse::<u64>().ok())
            .unwrap_or(1000);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }
}

/// Always fails, with the task's `name` as the message when present.
pub struct FailAction;

#[async_trait]
impl Action for FailAction {
    async fn run(&self, ctx: &ActionContext) -> Result<(), ActionError> {
        Err(ActionError::new(
            ctx.task.name.clone().unwrap_or_else(|| "task failed".to_string()),
        ))
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
