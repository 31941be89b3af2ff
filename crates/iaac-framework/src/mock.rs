//! # Mock Kind & Testing Guide
//!
//! [`MockKind`] is a resource kind that constructs in-memory handles and counts
//! every constructor call. It exists so the engine's laziness, memoization and
//! ordering can be tested without any cloud vocabulary.
//!
//! ## What it records
//!
//! | Query | Meaning |
//! |-------|---------|
//! | [`MockKind::constructions`] | Successful constructor calls |
//! | [`MockKind::attempts`] | All constructor calls, including rejected ones |
//! | [`MockKind::constructed_ids`] | Logical ids in construction order |
//!
//! ## Error injection
//!
//! Failures are scripted with expectations, in the same spirit as a mock
//! client: `kind.expect_construct("Storage").return_err("quota")` makes the
//! next construction of `Storage` fail, after which constructions proceed
//! normally. [`MockKind::verify`] panics if a scripted expectation was never
//! consumed. A configuration can also reject itself with
//! [`MockConfig::rejecting`], which models an invalid definition that only the
//! constructor can detect.
//!
//! ```rust
//! use iaac_framework::mock::{MockConfig, MockKind};
//! use iaac_framework::{iaac, join, CompositionError, Stack, StackEnv};
//!
//! let kind = MockKind::new();
//! kind.expect_construct("Storage").return_err("throttled");
//! let storage = iaac(kind.clone()).define("Storage", |_| Ok(MockConfig::labelled("table")));
//!
//! let stack = Stack::new("demo", StackEnv::default());
//! let first = join(&stack, &storage);
//! assert!(matches!(first, Err(CompositionError::Construction { .. })));
//!
//! // Nothing was memoized, so a retry constructs cleanly.
//! join(&stack, &storage).unwrap();
//! assert_eq!(kind.attempts(), 2);
//! assert_eq!(kind.constructions(), 1);
//! kind.verify();
//! ```

use crate::error::BoxError;
use crate::kind::{ConstructContext, Resource, ResourceKind};
use crate::template::{ResourceEntry, Template};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Template type the mock renders.
pub const MOCK_TYPE: &str = "Mock::Resource";

/// Error returned by scripted or self-rejecting constructions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Mock construction of '{id}' rejected: {reason}")]
pub struct MockError {
    pub id: String,
    pub reason: String,
}

/// Configuration of a mock resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockConfig {
    pub label: String,
    pub reject: Option<String>,
}

impl MockConfig {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reject: None,
        }
    }

    /// A configuration the constructor refuses.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            label: String::new(),
            reject: Some(reason.into()),
        }
    }
}

/// Handle produced by [`MockKind`].
#[derive(Debug)]
pub struct MockHandle {
    id: String,
    scope: String,
    config: MockConfig,
    serial: usize,
    connections: RefCell<Vec<String>>,
}

impl MockHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Position of this construction among all successful ones of the kind.
    pub fn serial(&self) -> usize {
        self.serial
    }

    /// Records a wiring call, as an effect would make.
    pub fn connect(&self, target: &str) {
        self.connections.borrow_mut().push(target.to_string());
    }

    pub fn connections(&self) -> Vec<String> {
        self.connections.borrow().clone()
    }
}

impl Resource for MockHandle {
    fn logical_id(&self) -> &str {
        &self.id
    }

    fn render(&self, template: &mut Template) -> Result<(), BoxError> {
        let connections = self.connections();
        let properties = json!({
            "Label": self.config.label,
            "Connections": connections,
        });
        template.add_resource(&self.id, ResourceEntry::new(MOCK_TYPE, properties))?;
        Ok(())
    }
}

enum Expectation {
    Fail { id: String, reason: String },
}

#[derive(Default)]
struct MockState {
    attempts: Cell<usize>,
    constructed: RefCell<Vec<String>>,
    expectations: RefCell<VecDeque<Expectation>>,
}

/// A counting resource kind. Clones share their counters.
#[derive(Clone, Default)]
pub struct MockKind {
    state: Rc<MockState>,
}

impl MockKind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a construction of the given logical id.
    pub fn expect_construct(&self, id: impl Into<String>) -> ConstructExpectationBuilder {
        ConstructExpectationBuilder {
            id: id.into(),
            state: self.state.clone(),
        }
    }

    pub fn constructions(&self) -> usize {
        self.state.constructed.borrow().len()
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.get()
    }

    pub fn constructed_ids(&self) -> Vec<String> {
        self.state.constructed.borrow().clone()
    }

    /// Verifies that all scripted expectations were consumed.
    pub fn verify(&self) {
        let remaining = self.state.expectations.borrow().len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }

    fn take_failure(&self, id: &str) -> Option<String> {
        let mut expectations = self.state.expectations.borrow_mut();
        let position = expectations.iter().position(|expectation| match expectation {
            Expectation::Fail { id: expected, .. } => expected == id,
        })?;
        expectations.remove(position).map(|expectation| match expectation {
            Expectation::Fail { reason, .. } => reason,
        })
    }
}

/// Builder for construction expectations.
pub struct ConstructExpectationBuilder {
    id: String,
    state: Rc<MockState>,
}

impl ConstructExpectationBuilder {
    /// Makes the next construction of this id fail with `reason`.
    pub fn return_err(self, reason: impl Into<String>) {
        self.state.expectations.borrow_mut().push_back(Expectation::Fail {
            id: self.id,
            reason: reason.into(),
        });
    }
}

impl ResourceKind for MockKind {
    type Config = MockConfig;
    type Handle = MockHandle;

    fn type_name(&self) -> &'static str {
        MOCK_TYPE
    }

    fn construct(&self, ctx: &ConstructContext<'_>, config: MockConfig) -> Result<MockHandle, BoxError> {
        self.state.attempts.set(self.state.attempts.get() + 1);
        let id = ctx.logical_id().to_string();

        let rejection = self.take_failure(&id).or_else(|| config.reject.clone());
        if let Some(reason) = rejection {
            return Err(Box::new(MockError { id, reason }));
        }

        let mut constructed = self.state.constructed.borrow_mut();
        let serial = constructed.len();
        constructed.push(id.clone());
        Ok(MockHandle {
            id,
            scope: ctx.scope_path(),
            config,
            serial,
            connections: RefCell::new(Vec::new()),
        })
    }
}
