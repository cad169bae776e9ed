// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured validation errors and string canonicalization helpers.

use std::fmt;

/// Trim a string, returning `None` when the result is empty.
pub fn trim(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Trim and casefold a string, returning `None` when the result is empty.
pub fn trim_casefold(s: &str) -> Option<String> {
    trim(s).map(|t| t.to_lowercase())
}

/// A single structured validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// An operation was attempted against invalid or ill-formed state.
///
/// Carries the full issue list so callers can surface every failure at once
/// instead of fixing them one save at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidState {
    pub issues: Vec<ValidationIssue>,
}

impl InvalidState {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Single-issue convenience constructor.
    pub fn msg(field: &'static str, message: impl Into<String>) -> Self {
        Self { issues: vec![ValidationIssue::new(field, message)] }
    }
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i == 0 {
                write!(f, ": {}", issue)?;
            } else {
                write!(f, "; {}", issue)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for InvalidState {}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
