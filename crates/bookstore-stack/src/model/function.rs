//! Compute function (`AWS::Lambda::Function`) and its optional log group.

use crate::error::ResourceError;
use crate::model::RoleHandle;
use iaac_framework::{BoxError, ConstructContext, Resource, ResourceEntry, ResourceKind, Template, Token};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::Rc;

pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";
pub const LOG_GROUP_TYPE: &str = "AWS::Logs::LogGroup";

const MEMORY_RANGE: std::ops::RangeInclusive<u32> = 128..=10240;
const TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 1..=900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Runtime {
    #[serde(rename = "go1.x")]
    Go1x,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Go1x => "go1.x",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

/// Prebuilt handler package: where it lives, its entry point and runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerAsset {
    pub path: PathBuf,
    pub handler: String,
    pub runtime: Runtime,
}

impl HandlerAsset {
    pub fn new(path: impl Into<PathBuf>, handler: impl Into<String>, runtime: Runtime) -> Self {
        Self {
            path: path.into(),
            handler: handler.into(),
            runtime,
        }
    }
}

/// Retention of the function's log group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRetention {
    OneDay,
    ThreeDays,
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    Infinite,
}

impl LogRetention {
    /// Days to keep, or `None` to keep forever.
    pub fn days(&self) -> Option<u32> {
        match self {
            LogRetention::OneDay => Some(1),
            LogRetention::ThreeDays => Some(3),
            LogRetention::FiveDays => Some(5),
            LogRetention::OneWeek => Some(7),
            LogRetention::TwoWeeks => Some(14),
            LogRetention::OneMonth => Some(30),
            LogRetention::ThreeMonths => Some(90),
            LogRetention::SixMonths => Some(180),
            LogRetention::OneYear => Some(365),
            LogRetention::Infinite => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub code: HandlerAsset,
    pub role: Rc<RoleHandle>,
    pub function_name: Option<Token>,
    pub environment: Vec<(String, Token)>,
    pub log_retention: Option<LogRetention>,
    pub memory_size: u32,
    pub timeout_secs: u32,
}

impl FunctionConfig {
    /// 128 MB, 3 second timeout, no environment and default log retention.
    pub fn new(code: HandlerAsset, role: Rc<RoleHandle>) -> Self {
        Self {
            code,
            role,
            function_name: None,
            environment: Vec::new(),
            log_retention: None,
            memory_size: 128,
            timeout_secs: 3,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<Token>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionKind;

impl ResourceKind for FunctionKind {
    type Config = FunctionConfig;
    type Handle = FunctionHandle;

    fn type_name(&self) -> &'static str {
        FUNCTION_TYPE
    }

    fn construct(&self, ctx: &ConstructContext<'_>, config: FunctionConfig) -> Result<FunctionHandle, BoxError> {
        if config.code.handler.is_empty() {
            return Err(ResourceError::invalid("function", "handler", "entry point is empty").into());
        }
        if !MEMORY_RANGE.contains(&config.memory_size) {
            return Err(ResourceError::invalid(
                "function",
                "memory_size",
                format!("{} MB is outside 128..=10240", config.memory_size),
            )
            .into());
        }
        if !TIMEOUT_RANGE.contains(&config.timeout_secs) {
            return Err(ResourceError::invalid(
                "function",
                "timeout_secs",
                format!("{} s is outside 1..=900", config.timeout_secs),
            )
            .into());
        }

        let mut keys = BTreeSet::new();
        for (key, _) in &config.environment {
            if key.is_empty() {
                return Err(ResourceError::invalid("function", "environment", "variable name is empty").into());
            }
            if !keys.insert(key.as_str()) {
                return Err(ResourceError::invalid(
                    "function",
                    "environment",
                    format!("variable '{key}' is set twice"),
                )
                .into());
            }
        }

        let log_group_id = match config.log_retention {
            Some(_) => Some(ctx.reserve_child("LogRetention")?),
            None => None,
        };

        Ok(FunctionHandle {
            id: ctx.logical_id().to_string(),
            log_group_id,
            config,
        })
    }
}

#[derive(Debug)]
pub struct FunctionHandle {
    id: String,
    log_group_id: Option<String>,
    config: FunctionConfig,
}

impl FunctionHandle {
    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    pub fn function_arn(&self) -> Token {
        Token::get_att(&self.id, "Arn")
    }

    pub fn function_name(&self) -> Token {
        Token::reference(&self.id)
    }

    fn properties(&self) -> Value {
        let config = &self.config;
        let mut properties = Map::new();
        properties.insert(
            "Code".into(),
            json!({
                "S3Bucket": Token::sub("cdk-assets-${AWS::AccountId}-${AWS::Region}"),
                "S3Key": format!("{}.zip", self.id),
            }),
        );
        properties.insert("Handler".into(), json!(config.code.handler));
        properties.insert("Runtime".into(), json!(config.code.runtime));
        properties.insert("Role".into(), config.role.role_arn().to_json());
        properties.insert("MemorySize".into(), json!(config.memory_size));
        properties.insert("Timeout".into(), json!(config.timeout_secs));
        if let Some(name) = &config.function_name {
            properties.insert("FunctionName".into(), name.to_json());
        }
        if !config.environment.is_empty() {
            let variables: Map<String, Value> = config
                .environment
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            properties.insert("Environment".into(), json!({ "Variables": variables }));
        }
        Value::Object(properties)
    }
}

impl Resource for FunctionHandle {
    fn logical_id(&self) -> &str {
        &self.id
    }

    fn render(&self, template: &mut Template) -> Result<(), BoxError> {
        let metadata = json!({
            "aws:asset:path": self.config.code.path.display().to_string(),
            "aws:asset:property": "Code",
        });
        let entry = ResourceEntry::new(FUNCTION_TYPE, self.properties())
            .depends_on(self.config.role.logical_id())
            .with_metadata(metadata);
        template.add_resource(&self.id, entry)?;

        if let (Some(retention), Some(log_group_id)) = (self.config.log_retention, &self.log_group_id) {
            let mut properties = json!({
                "LogGroupName": Token::concat(vec!["/aws/lambda/".into(), self.function_name()]),
            });
            if let Some(days) = retention.days() {
                properties["RetentionInDays"] = json!(days);
            }
            template.add_resource(log_group_id, ResourceEntry::new(LOG_GROUP_TYPE, properties))?;
        }
        Ok(())
    }
}
