//! # Bookstore Stack
//!
//! A serverless CRUD API for books, declared with the
//! [`iaac_framework`] combinators.
//!
//! - **[model]**: the resource library. Kinds, configurations and handles for
//!   tables, roles, functions and REST APIs, plus the function integration.
//! - **[blueprint]**: the bookstore's definitions, one builder per resource and
//!   the effect that registers its routes.
//! - **[lifecycle]**: [`BookstoreStack`](lifecycle::BookstoreStack), which
//!   declares the builders and joins them into a stack.
//! - **[error]**: validation and routing errors raised by the resource library.
//!
//! The `bookstore-stack` binary composes the stack and writes its template;
//! see `--help` for the options.

pub mod blueprint;
pub mod error;
pub mod lifecycle;
pub mod model;

pub use error::ResourceError;
