//! # Bookstore Definitions
//!
//! The resources of the bookstore CRUD service, each declared as a builder.
//! Dependencies are explicit: the role reads the table's ARN, the function
//! reads the role and the table name, and the routes effect wires the API to
//! the function integration once both exist.
//!
//! ```text
//! Storage ──► Role ──► Lambda ──wrap──► integration ─┐
//!    └─────────────────────┘                         ├─► routes effect
//! Gateway ───────────────────────────────────────────┘
//! ```
//!
//! Nothing here constructs anything; see
//! [`BookstoreStack`](crate::lifecycle::BookstoreStack) for the joins.

use crate::model::{
    lambda_integration, Attribute, BillingMode, CorsOptions, EndpointType, FunctionConfig, FunctionIntegration,
    FunctionKind, HandlerAsset, LogRetention, PolicyStatement, RemovalPolicy, RestApiConfig, RestApiKind, RoleConfig,
    RoleKind, TableConfig, TableKind,
};
use iaac_framework::{iaac, uses, Builder, Effect, Token};

/// Table partition key attribute.
pub const PARTITION_KEY: &str = "prefix";
/// Table sort key attribute.
pub const SORT_KEY: &str = "suffix";
/// Stage the API is deployed to.
pub const STAGE_NAME: &str = "api";
/// Environment variable the handler reads its storage location from.
pub const STORAGE_VAR: &str = "CONFIG_DDB";
/// Route collection served by the handler.
pub const COLLECTION: &str = "books";

const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";
const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";
const CORS_MAX_AGE_SECS: u32 = 10 * 60;

pub type StorageBuilder = Builder<TableKind>;
pub type RoleBuilder = Builder<RoleKind, (StorageBuilder,)>;
pub type LambdaBuilder = Builder<FunctionKind, (RoleBuilder, StorageBuilder)>;
pub type IntegrationBuilder = FunctionIntegration<(RoleBuilder, StorageBuilder)>;
pub type GatewayBuilder = Builder<RestApiKind>;
pub type RoutesEffect = Effect<(GatewayBuilder, IntegrationBuilder)>;

/// Key-value table, destroyed with the stack.
pub fn storage() -> StorageBuilder {
    iaac(TableKind).define("Storage", |_| {
        Ok(TableConfig {
            partition_key: Attribute::string(PARTITION_KEY),
            sort_key: Some(Attribute::string(SORT_KEY)),
            billing: BillingMode::Provisioned { read: 1, write: 1 },
            removal_policy: RemovalPolicy::Destroy,
            table_name: Some(Token::sub("${AWS::StackName}-db")),
        })
    })
}

/// Execution role with full access to the table.
pub fn role(storage: &StorageBuilder) -> RoleBuilder {
    iaac(RoleKind).after((storage.clone(),)).define("Role", |(storage,)| {
        let access = PolicyStatement::allow(["dynamodb:*"], vec![storage.table_arn()]);
        Ok(RoleConfig::assumed_by(LAMBDA_PRINCIPAL)
            .managed_policy(BASIC_EXECUTION_POLICY)
            .inline_policy("default", vec![access]))
    })
}

/// The CRUD handler, packaged at `asset`.
pub fn lambda(asset: HandlerAsset, role: &RoleBuilder, storage: &StorageBuilder) -> LambdaBuilder {
    iaac(FunctionKind)
        .after((role.clone(), storage.clone()))
        .define("Lambda", move |(role, storage)| {
            let location = Token::concat(vec!["ddb:///".into(), storage.table_name()]);
            let mut config = FunctionConfig::new(asset.clone(), role.clone()).env(STORAGE_VAR, location);
            config.function_name = Some(Token::sub("${AWS::StackName}-crud"));
            config.log_retention = Some(LogRetention::FiveDays);
            Ok(config)
        })
}

/// Regional API deployed to the `api` stage, open to any origin.
pub fn gateway() -> GatewayBuilder {
    iaac(RestApiKind).define("Gateway", |_| {
        let mut config = RestApiConfig::deployed(STAGE_NAME);
        config.endpoint_types = vec![EndpointType::Regional];
        config.fail_on_warnings = true;
        config.cors = Some(CorsOptions::all_origins().max_age(CORS_MAX_AGE_SECS));
        Ok(config)
    })
}

/// Routes `/books` and `/books/{any+}` to the handler.
pub fn routes(rest: &GatewayBuilder, integration: &IntegrationBuilder) -> RoutesEffect {
    uses((rest.clone(), integration.clone())).effect(|(rest, integration)| {
        let collection = rest.root().add_resource(COLLECTION)?;
        collection.add_method("ANY", integration)?;

        let element = collection.add_resource("{any+}")?;
        element.add_method("ANY", integration)?;
        Ok(())
    })
}

/// Wraps the handler as the API's integration.
pub fn integration(lambda: &LambdaBuilder) -> IntegrationBuilder {
    lambda_integration(lambda.clone())
}
