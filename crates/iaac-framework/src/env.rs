//! # Stack Environment
//!
//! The target account and region come from `CDK_DEFAULT_ACCOUNT` and
//! `CDK_DEFAULT_REGION`. Neither is required: an unset (or empty) variable falls
//! back to the provider pseudo parameter, so the deployed stack resolves it.
//!
//! Lookups go through a closure so callers and tests can substitute their own
//! source instead of the process environment.

use crate::token::Token;

/// Variable naming the target account.
pub const ACCOUNT_VAR: &str = "CDK_DEFAULT_ACCOUNT";

/// Variable naming the target region.
pub const REGION_VAR: &str = "CDK_DEFAULT_REGION";

/// A variable a definition explicitly requires was not set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Required environment variable '{0}' is not set")]
pub struct MissingEnvironment(pub String);

/// Deployment target of a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEnv {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl StackEnv {
    /// Reads the target from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the target through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            account: optional(&lookup, ACCOUNT_VAR),
            region: optional(&lookup, REGION_VAR),
        }
    }

    /// The account, or `AWS::AccountId` when unset.
    pub fn account_token(&self) -> Token {
        self.account
            .as_deref()
            .map_or_else(Token::account_id, Token::literal)
    }

    /// The region, or `AWS::Region` when unset.
    pub fn region_token(&self) -> Token {
        self.region
            .as_deref()
            .map_or_else(Token::region, Token::literal)
    }
}

/// Returns the non-empty value of `name`, if any.
pub fn optional<F>(lookup: F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|value| !value.is_empty())
}

/// Returns the value of `name`, or `default` when it is unset.
pub fn optional_or<F>(lookup: F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).unwrap_or_else(|| default.to_string())
}

/// Returns the value of `name`, failing when it is unset.
pub fn required<F>(lookup: F, name: &str) -> Result<String, MissingEnvironment>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or_else(|| MissingEnvironment(name.to_string()))
}
