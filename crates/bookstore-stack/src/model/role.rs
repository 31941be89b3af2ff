//! Execution role (`AWS::IAM::Role`).

use crate::error::ResourceError;
use iaac_framework::{BoxError, ConstructContext, Resource, ResourceEntry, ResourceKind, Template, Token};
use serde_json::{json, Value};
use std::collections::BTreeSet;

pub const ROLE_TYPE: &str = "AWS::IAM::Role";

const POLICY_VERSION: &str = "2012-10-17";

/// Whether a statement grants or denies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyEffect {
    #[default]
    Allow,
    Deny,
}

impl PolicyEffect {
    fn as_str(&self) -> &'static str {
        match self {
            PolicyEffect::Allow => "Allow",
            PolicyEffect::Deny => "Deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: PolicyEffect,
    pub actions: Vec<String>,
    pub resources: Vec<Token>,
}

impl PolicyStatement {
    pub fn allow<A: Into<String>>(actions: impl IntoIterator<Item = A>, resources: Vec<Token>) -> Self {
        Self {
            effect: PolicyEffect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources,
        }
    }

    fn to_json(&self) -> Value {
        let resources: Vec<Value> = self.resources.iter().map(Token::to_json).collect();
        json!({
            "Effect": self.effect.as_str(),
            "Action": self.actions,
            "Resource": resources,
        })
    }
}

/// A named inline policy.
#[derive(Debug, Clone, PartialEq)]
pub struct InlinePolicy {
    pub name: String,
    pub statements: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    /// Service principal allowed to assume the role, e.g. `lambda.amazonaws.com`.
    pub assumed_by: String,
    /// AWS managed policy names, e.g. `service-role/AWSLambdaBasicExecutionRole`.
    pub managed_policies: Vec<String>,
    pub inline_policies: Vec<InlinePolicy>,
}

impl RoleConfig {
    pub fn assumed_by(service: impl Into<String>) -> Self {
        Self {
            assumed_by: service.into(),
            managed_policies: Vec::new(),
            inline_policies: Vec::new(),
        }
    }

    pub fn managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(name.into());
        self
    }

    pub fn inline_policy(mut self, name: impl Into<String>, statements: Vec<PolicyStatement>) -> Self {
        self.inline_policies.push(InlinePolicy {
            name: name.into(),
            statements,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleKind;

impl ResourceKind for RoleKind {
    type Config = RoleConfig;
    type Handle = RoleHandle;

    fn type_name(&self) -> &'static str {
        ROLE_TYPE
    }

    fn construct(&self, ctx: &ConstructContext<'_>, config: RoleConfig) -> Result<RoleHandle, BoxError> {
        if config.assumed_by.is_empty() {
            return Err(ResourceError::invalid("role", "assumed_by", "service principal is empty").into());
        }

        let mut names = BTreeSet::new();
        for policy in &config.inline_policies {
            if !names.insert(policy.name.as_str()) {
                return Err(ResourceError::invalid(
                    "role",
                    "inline_policies",
                    format!("policy '{}' is declared twice", policy.name),
                )
                .into());
            }
            for statement in &policy.statements {
                if statement.actions.is_empty() {
                    return Err(ResourceError::invalid(
                        "role",
                        "inline_policies",
                        format!("statement in '{}' has no actions", policy.name),
                    )
                    .into());
                }
                if statement.resources.is_empty() {
                    return Err(ResourceError::invalid(
                        "role",
                        "inline_policies",
                        format!("statement in '{}' has no resources", policy.name),
                    )
                    .into());
                }
            }
        }

        Ok(RoleHandle {
            id: ctx.logical_id().to_string(),
            config,
        })
    }
}

#[derive(Debug)]
pub struct RoleHandle {
    id: String,
    config: RoleConfig,
}

impl RoleHandle {
    pub fn config(&self) -> &RoleConfig {
        &self.config
    }

    pub fn role_arn(&self) -> Token {
        Token::get_att(&self.id, "Arn")
    }

    fn managed_policy_arn(name: &str) -> Token {
        Token::concat(vec![
            "arn:".into(),
            Token::partition(),
            format!(":iam::aws:policy/{name}").into(),
        ])
    }
}

impl Resource for RoleHandle {
    fn logical_id(&self) -> &str {
        &self.id
    }

    fn render(&self, template: &mut Template) -> Result<(), BoxError> {
        let assume = json!({
            "Version": POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Service": self.config.assumed_by },
                "Action": "sts:AssumeRole",
            }],
        });

        let mut properties = json!({ "AssumeRolePolicyDocument": assume });
        if !self.config.managed_policies.is_empty() {
            let arns: Vec<Value> = self
                .config
                .managed_policies
                .iter()
                .map(|name| Self::managed_policy_arn(name).to_json())
                .collect();
            properties["ManagedPolicyArns"] = Value::Array(arns);
        }
        if !self.config.inline_policies.is_empty() {
            let policies: Vec<Value> = self
                .config
                .inline_policies
                .iter()
                .map(|policy| {
                    let statements: Vec<Value> = policy.statements.iter().map(PolicyStatement::to_json).collect();
                    json!({
                        "PolicyName": policy.name,
                        "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements },
                    })
                })
                .collect();
            properties["Policies"] = Value::Array(policies);
        }

        template.add_resource(&self.id, ResourceEntry::new(ROLE_TYPE, properties))?;
        Ok(())
    }
}
