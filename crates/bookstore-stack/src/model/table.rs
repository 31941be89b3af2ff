//! Key-value table (`AWS::DynamoDB::Table`).

use crate::error::ResourceError;
use crate::model::RemovalPolicy;
use iaac_framework::{BoxError, ConstructContext, Resource, ResourceEntry, ResourceKind, Template, Token};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const TABLE_TYPE: &str = "AWS::DynamoDB::Table";

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

/// A key attribute of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl Attribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::String,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    Provisioned { read: u32, write: u32 },
    PayPerRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,
    pub billing: BillingMode,
    pub removal_policy: RemovalPolicy,
    pub table_name: Option<Token>,
}

impl TableConfig {
    /// A provisioned 1/1 table keyed by `partition_key`, retained on removal.
    pub fn new(partition_key: Attribute) -> Self {
        Self {
            partition_key,
            sort_key: None,
            billing: BillingMode::Provisioned { read: 1, write: 1 },
            removal_policy: RemovalPolicy::default(),
            table_name: None,
        }
    }
}

/// Constructor capability for tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableKind;

impl ResourceKind for TableKind {
    type Config = TableConfig;
    type Handle = TableHandle;

    fn type_name(&self) -> &'static str {
        TABLE_TYPE
    }

    fn construct(&self, ctx: &ConstructContext<'_>, config: TableConfig) -> Result<TableHandle, BoxError> {
        if config.partition_key.name.is_empty() {
            return Err(ResourceError::invalid("table", "partition_key", "attribute name is empty").into());
        }
        if let Some(sort_key) = &config.sort_key {
            if sort_key.name.is_empty() {
                return Err(ResourceError::invalid("table", "sort_key", "attribute name is empty").into());
            }
            if sort_key.name == config.partition_key.name {
                return Err(ResourceError::invalid(
                    "table",
                    "sort_key",
                    format!("'{}' is already the partition key", sort_key.name),
                )
                .into());
            }
        }
        if let BillingMode::Provisioned { read, write } = config.billing {
            if read == 0 || write == 0 {
                return Err(ResourceError::invalid(
                    "table",
                    "billing",
                    format!("provisioned capacity must be positive, got read {read} write {write}"),
                )
                .into());
            }
        }

        Ok(TableHandle {
            id: ctx.logical_id().to_string(),
            config,
        })
    }
}

#[derive(Debug)]
pub struct TableHandle {
    id: String,
    config: TableConfig,
}

impl TableHandle {
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The physical table name, resolved at deploy time.
    pub fn table_name(&self) -> Token {
        Token::reference(&self.id)
    }

    pub fn table_arn(&self) -> Token {
        Token::get_att(&self.id, "Arn")
    }

    fn properties(&self) -> Value {
        let keys = std::iter::once((&self.config.partition_key, "HASH"))
            .chain(self.config.sort_key.iter().map(|key| (key, "RANGE")));

        let mut key_schema = Vec::new();
        let mut definitions = Vec::new();
        for (attribute, key_type) in keys {
            key_schema.push(json!({ "AttributeName": attribute.name, "KeyType": key_type }));
            definitions.push(json!({
                "AttributeName": attribute.name,
                "AttributeType": attribute.attribute_type,
            }));
        }

        let mut properties = Map::new();
        properties.insert("KeySchema".into(), Value::Array(key_schema));
        properties.insert("AttributeDefinitions".into(), Value::Array(definitions));
        match self.config.billing {
            BillingMode::Provisioned { read, write } => {
                properties.insert(
                    "ProvisionedThroughput".into(),
                    json!({ "ReadCapacityUnits": read, "WriteCapacityUnits": write }),
                );
            }
            BillingMode::PayPerRequest => {
                properties.insert("BillingMode".into(), json!("PAY_PER_REQUEST"));
            }
        }
        if let Some(name) = &self.config.table_name {
            properties.insert("TableName".into(), name.to_json());
        }
        Value::Object(properties)
    }
}

impl Resource for TableHandle {
    fn logical_id(&self) -> &str {
        &self.id
    }

    fn render(&self, template: &mut Template) -> Result<(), BoxError> {
        let entry = ResourceEntry::new(TABLE_TYPE, self.properties()).with_policy(self.config.removal_policy.as_str());
        template.add_resource(&self.id, entry)?;
        Ok(())
    }
}
