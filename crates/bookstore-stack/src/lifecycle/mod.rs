//! # Stack Lifecycle
//!
//! Declaring builders and joining them are separate steps. [`BookstoreStack::new`]
//! creates the stack root and declares every definition without constructing
//! anything; [`BookstoreStack::compose`] performs the joins. Tests use the gap
//! between the two to join builders independently and inspect their handles.
//!
//! ## Join order
//!
//! 1. `Storage` and `Role` are joined directly.
//! 2. The routes effect is joined; resolving it constructs `Gateway` and, through
//!    the integration adapter, `Lambda`.
//!
//! Every builder is still constructed exactly once, whichever of the joins
//! reaches it first.
//!
//! ## Observability
//!
//! The binary installs [`setup_tracing`](iaac_framework::tracing::setup_tracing)
//! before composing; each construction and the applied effect are logged with
//! their scope path and logical id.

pub mod bookstore_stack;

pub use bookstore_stack::*;
