//! # Observability & Tracing
//!
//! The engine logs through the `tracing` crate with structured fields:
//!
//! - `scope`: slash-separated scope path (`bookstore/Api`)
//! - `name`: definition name of the builder being joined
//! - `id`: derived logical identifier
//! - `kind`: template type of the resource
//!
//! Declarations and memo hits log at `debug`/`trace`; constructions, applied
//! effects and synthesis at `info`; every failure at `warn` before the error is
//! returned.
//!
//! ```bash
//! RUST_LOG=info bookstore-stack            # one line per construction
//! RUST_LOG=debug bookstore-stack --stdout  # declarations and nested scopes too
//! RUST_LOG=iaac_framework=trace bookstore-stack
//! ```
//!
//! Logs go to stderr so a template printed to stdout stays machine readable.

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
