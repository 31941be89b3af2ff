//! # IaaC Framework
//!
//! This crate is the composition engine behind declarative infrastructure
//! stacks. Resources are described by **pure definitions**, bound to a
//! **resource kind** and turned into lazy, memoized **builders**. Builders are
//! joined into a **scope**, where each one is instantiated at most once, and
//! cross-resource wiring is applied through **effects** once everything it
//! touches exists. Finally the stack is **synthesized** into a template.
//!
//! ## Why factories instead of constructors?
//!
//! Calling a resource constructor directly ties creation to call order and
//! makes sharing a resource between two consumers a matter of passing the right
//! variable around. Builders invert that:
//!
//! - **Singletons per scope**: joining the same builder twice returns the same
//!   `Rc` handle; the underlying constructor runs once.
//! - **Explicit DAG**: a definition names its dependencies with
//!   [`Factory::after`], and the engine resolves them before the definition
//!   runs. No ambient globals, no reliance on statement order.
//! - **Deterministic output**: logical identifiers derive from the scope path
//!   and the definition name, never from clocks or randomness, so synthesis is
//!   byte-for-byte repeatable.
//!
//! ## The Four Combinators
//!
//! | Combinator | Produces | Joined result |
//! |------------|----------|---------------|
//! | [`iaac`]`(kind).define(name, f)` | [`Builder`] | `Rc<K::Handle>` |
//! | [`wrap`]`(adapter)(component)` | [`Adapted`] | `Rc<O>` view of the inner handle |
//! | [`uses`]`(deps).effect(f)` | [`Effect`] | `()`, callback run once |
//! | [`join`]`(scope, component)` | the component's output | memoized per scope |
//!
//! ## Example
//!
//! ```rust
//! use iaac_framework::mock::{MockConfig, MockHandle, MockKind};
//! use iaac_framework::{iaac, join, uses, wrap, Stack, StackEnv};
//! use std::rc::Rc;
//!
//! let kind = MockKind::new();
//!
//! // 1. Declare (nothing is constructed yet)
//! let table = iaac(kind.clone()).define("Table", |_| Ok(MockConfig::labelled("table")));
//! let function = iaac(kind.clone())
//!     .after((table.clone(),))
//!     .define("Function", |(table,)| {
//!         Ok(MockConfig::labelled(format!("reads {}", table.id())))
//!     });
//! let endpoint = wrap(|function: &Rc<MockHandle>| format!("invoke:{}", function.id()))(function.clone());
//! let wiring = uses((table.clone(), endpoint.clone())).effect(|(table, endpoint)| {
//!     table.connect(endpoint);
//!     Ok(())
//! });
//!
//! // 2. Join into the stack
//! let stack = Stack::new("demo", StackEnv::default());
//! join(&stack, &wiring)?;
//!
//! // 3. Every builder was constructed exactly once
//! assert_eq!(kind.constructed_ids(), vec!["Table", "Function"]);
//!
//! // 4. Synthesize
//! let template = stack.synth()?;
//! assert_eq!(template.len(), 2);
//! # Ok::<(), iaac_framework::CompositionError>(())
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`CompositionError`]. Definition, construction and
//! effect failures carry the definition name (and scope path) so the faulty
//! declaration can be found. Failures are never retried by the engine; a failed
//! construction memoizes nothing, and a failed effect taints the stack so it
//! cannot be synthesized.
//!
//! ## Concurrency Model
//!
//! Composition is single-threaded and synchronous. Handles are `Rc` and the
//! memo table is a `RefCell`, so the types are `!Send` by construction and no
//! locking is involved.
//!
//! ## Testing
//!
//! The [`mock`] module provides a counting [`MockKind`](mock::MockKind) with
//! scripted failures for testing composition logic without any real resource
//! library.

pub mod adapter;
pub mod builder;
pub mod deps;
pub mod effect;
pub mod env;
pub mod error;
pub mod kind;
pub mod mock;
pub mod scope;
pub mod template;
pub mod token;
pub mod tracing;

// Re-export core types for convenience
pub use adapter::{wrap, Adapted};
pub use builder::{iaac, join, Builder, Component, Factory};
pub use deps::Dependencies;
pub use effect::{uses, Effect, Uses};
pub use env::{MissingEnvironment, StackEnv};
pub use error::{BoxError, CompositionError, Result};
pub use kind::{sanitize_identifier, ConstructContext, Resource, ResourceKind};
pub use scope::{IdentifierRegistry, Scope, Stack};
pub use template::{OutputEntry, ResourceEntry, Template, TemplateError};
pub use token::Token;
