//! # Deferred Attribute Tokens
//!
//! A [`Token`] stands in for a value that only exists once the template is
//! deployed: a table's generated name, a role's ARN, the target region. Handles
//! hand tokens to downstream definitions, and the template renders them as
//! CloudFormation intrinsic functions.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// A value resolved by the provisioning engine at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain string known at synthesis time.
    Literal(String),
    /// `{"Ref": id}`; a resource's primary identifier or a pseudo parameter.
    Ref(String),
    /// `{"Fn::GetAtt": [id, attribute]}`.
    GetAtt { id: String, attribute: String },
    /// `{"Fn::Sub": template}` with `${...}` placeholders.
    Sub(String),
    /// `{"Fn::Join": [separator, parts]}`.
    Join { separator: String, parts: Vec<Token> },
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Token::Ref(id.into())
    }

    pub fn get_att(id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt {
            id: id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Token::Sub(template.into())
    }

    /// Concatenates the parts with no separator.
    pub fn concat(parts: Vec<Token>) -> Self {
        Token::Join {
            separator: String::new(),
            parts,
        }
    }

    /// `AWS::StackName`.
    pub fn stack_name() -> Self {
        Token::reference("AWS::StackName")
    }

    /// `AWS::AccountId`.
    pub fn account_id() -> Self {
        Token::reference("AWS::AccountId")
    }

    /// `AWS::Region`.
    pub fn region() -> Self {
        Token::reference("AWS::Region")
    }

    /// `AWS::Partition`.
    pub fn partition() -> Self {
        Token::reference("AWS::Partition")
    }

    /// `AWS::URLSuffix`.
    pub fn url_suffix() -> Self {
        Token::reference("AWS::URLSuffix")
    }

    /// Returns the string when the token is known at synthesis time.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the token as template JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Token::Literal(value) => Value::String(value.clone()),
            Token::Ref(id) => json!({ "Ref": id }),
            Token::GetAtt { id, attribute } => json!({ "Fn::GetAtt": [id, attribute] }),
            Token::Sub(template) => json!({ "Fn::Sub": template }),
            Token::Join { separator, parts } => {
                let parts: Vec<Value> = parts.iter().map(Token::to_json).collect();
                json!({ "Fn::Join": [separator, parts] })
            }
        }
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::literal(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(value)
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
