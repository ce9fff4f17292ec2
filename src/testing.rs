//! Reusable node implementations for exercising the engine.
//!
//! These power the crate's integration tests and make handy building blocks
//! for downstream test suites: deterministic writers, controlled failures,
//! and artificial latency.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::node::{Node, NodeContext, NodeError};
use crate::state::{PartialUpdate, StateSnapshot};

/// Writes a fixed value to one key.
pub struct SetKeyNode {
    key: String,
    value: Value,
}

impl SetKeyNode {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[async_trait]
impl Node for SetKeyNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        Ok(PartialUpdate::new().set(self.key.clone(), self.value.clone()))
    }
}

/// Appends a fixed item to a sequence key.
pub struct AppendNode {
    key: String,
    item: Value,
}

impl AppendNode {
    pub fn new(key: impl Into<String>, item: Value) -> Self {
        Self {
            key: key.into(),
            item,
        }
    }
}

#[async_trait]
impl Node for AppendNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        Ok(PartialUpdate::new().set(self.key.clone(), self.item.clone()))
    }
}

/// Increments a counter key by one.
pub struct CountingNode {
    key: String,
}

impl CountingNode {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Node for CountingNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        Ok(PartialUpdate::new().set(self.key.clone(), json!(1)))
    }
}

/// Always fails with [`NodeError::Failed`].
pub struct FailingNode {
    message: String,
}

impl FailingNode {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Node for FailingNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        Err(NodeError::Failed(self.message.clone()))
    }
}

/// Fails a fixed number of times, then succeeds with an empty update.
///
/// `new` also hands back a shared invocation counter so tests can assert
/// exactly how many times the node ran.
pub struct FlakyNode {
    remaining_failures: AtomicU32,
    invocations: Arc<AtomicU32>,
}

impl FlakyNode {
    pub fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let invocations = Arc::new(AtomicU32::new(0));
        (
            Self {
                remaining_failures: AtomicU32::new(failures),
                invocations: Arc::clone(&invocations),
            },
            invocations,
        )
    }
}

#[async_trait]
impl Node for FlakyNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            Err(NodeError::Failed("transient failure".to_string()))
        } else {
            Ok(PartialUpdate::new())
        }
    }
}

/// Sleeps, then writes a fixed value. For timeout and ordering tests.
pub struct SlowNode {
    delay: Duration,
    key: String,
    value: Value,
}

impl SlowNode {
    pub fn new(delay: Duration, key: impl Into<String>, value: Value) -> Self {
        Self {
            delay,
            key: key.into(),
            value,
        }
    }
}

#[async_trait]
impl Node for SlowNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(PartialUpdate::new().set(self.key.clone(), self.value.clone()))
    }
}

/// Writes to a key that is deliberately left undeclared by the test schema.
pub struct RogueWriterNode;

#[async_trait]
impl Node for RogueWriterNode {
    async fn execute(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError> {
        Ok(PartialUpdate::new().set("__undeclared__", json!(true)))
    }
}
