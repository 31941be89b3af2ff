//! # Resource Library
//!
//! One module per resource kind. Each kind pairs a statically enumerated
//! configuration struct with a handle type, validates the configuration in its
//! constructor and renders the handle into the template.
//!
//! | Kind | Template type | Handle |
//! |------|---------------|--------|
//! | [`TableKind`] | `AWS::DynamoDB::Table` | [`TableHandle`] |
//! | [`RoleKind`] | `AWS::IAM::Role` | [`RoleHandle`] |
//! | [`FunctionKind`] | `AWS::Lambda::Function` | [`FunctionHandle`] |
//! | [`RestApiKind`] | `AWS::ApiGateway::RestApi` | [`RestApiHandle`] |
//!
//! [`LambdaIntegration`] is not a kind: it is a [`wrap`](iaac_framework::wrap)
//! view over a function builder.

pub mod function;
pub mod integration;
pub mod rest_api;
pub mod role;
pub mod table;

pub use function::*;
pub use integration::*;
pub use rest_api::*;
pub use role::*;
pub use table::*;

/// What happens to a stateful resource when it leaves the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Rendered as `Delete`.
    Destroy,
    #[default]
    Retain,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}
