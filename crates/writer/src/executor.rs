//! Write capability
//!
//! The writer does not know how connections are obtained or pooled. It hands
//! each rendered [`Statement`] to an injected [`Executor`] together with the
//! deadline sampled from the timeout controller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::entry::Value;
use crate::error::ExecuteError;

/// A bound statement argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Timestamp(DateTime<FixedOffset>),
    Value(Value),
}

/// A parameterized statement ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `$n` placeholders
    pub sql: String,

    /// Arguments in placeholder order
    pub args: Vec<Argument>,
}

/// Capability that executes a statement against the store
///
/// Implementations must honor `deadline`: exceeding it is a failure, not a
/// hang. The writer also enforces the deadline on its side.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement, deadline: Duration)
    -> Result<(), ExecuteError>;
}
