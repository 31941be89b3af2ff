//! # REST API and Routing
//!
//! [`RestApiKind`] constructs an `AWS::ApiGateway::RestApi` whose route tree
//! starts empty. Routes are registered afterwards, normally from an effect,
//! through [`ResourceNode::add_resource`] and [`ResourceNode::add_method`].
//!
//! ## Rendering
//!
//! | Logical id | Type |
//! |------------|------|
//! | `<api>` | `AWS::ApiGateway::RestApi` |
//! | `<api><Path>` | `AWS::ApiGateway::Resource`, one per route node |
//! | `<api><Path><VERB>` | `AWS::ApiGateway::Method` |
//! | `<api><Path><VERB>Permission` | `AWS::Lambda::Permission` for proxied methods |
//! | `<api>Deployment`, `<api>DeploymentStage<stage>` | deployment and stage when deploying |
//! | `<api>Endpoint` (output) | invoke URL of the stage |
//!
//! Path parts are pascal-cased into ids: `{id}` becomes `IdParam` and `{any+}`
//! becomes `AnyProxy`. Methods on the root node use `<api>Root<VERB>`.
//!
//! ## Conflicts
//!
//! Registering a path part twice under the same parent, or a verb twice on the
//! same node, fails with [`ResourceError`]. With CORS enabled every node owns an
//! `OPTIONS` preflight method, so registering `OPTIONS` explicitly conflicts.
//! Every id in the table above is claimed in the stack's identifier registry
//! when its route, method or stage is declared, so a clash with another
//! resource fails there with [`ResourceError::IdentifierTaken`].

use crate::error::ResourceError;
use crate::model::LambdaIntegration;
use iaac_framework::{
    BoxError, ConstructContext, IdentifierRegistry, OutputEntry, Resource, ResourceEntry, ResourceKind, StackEnv,
    Template, Token,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;
use tracing::debug;

pub const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";
pub const API_RESOURCE_TYPE: &str = "AWS::ApiGateway::Resource";
pub const METHOD_TYPE: &str = "AWS::ApiGateway::Method";
pub const DEPLOYMENT_TYPE: &str = "AWS::ApiGateway::Deployment";
pub const STAGE_TYPE: &str = "AWS::ApiGateway::Stage";
pub const PERMISSION_TYPE: &str = "AWS::Lambda::Permission";

/// Characters only allowed in the `{name}` / `{name+}` forms.
const RESERVED: &[char] = &['{', '}', '+'];

const DEFAULT_CORS_HEADERS: [&str; 4] = ["Content-Type", "X-Amz-Date", "Authorization", "X-Api-Key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Any,
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Any => "ANY",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ResourceError;

    fn from_str(verb: &str) -> Result<Self, Self::Err> {
        let upper = verb.to_ascii_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == upper)
            .ok_or_else(|| ResourceError::UnsupportedMethod(verb.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointType {
    Edge,
    Regional,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOptions {
    pub stage_name: String,
}

/// Default preflight answered on every route node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<HttpMethod>,
    pub allow_headers: Vec<String>,
    pub max_age_secs: Option<u32>,
}

impl CorsOptions {
    /// Any origin, any method, the default headers.
    pub fn all_origins() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: HttpMethod::ALL
                .into_iter()
                .filter(|method| *method != HttpMethod::Any)
                .collect(),
            allow_headers: DEFAULT_CORS_HEADERS.iter().map(|header| header.to_string()).collect(),
            max_age_secs: None,
        }
    }

    pub fn max_age(mut self, secs: u32) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    fn response_parameters(&self) -> Value {
        let methods: Vec<&str> = self.allow_methods.iter().map(HttpMethod::as_str).collect();
        let mut parameters = Map::new();
        parameters.insert(
            "method.response.header.Access-Control-Allow-Headers".into(),
            json!(format!("'{}'", self.allow_headers.join(","))),
        );
        parameters.insert(
            "method.response.header.Access-Control-Allow-Origin".into(),
            json!(format!("'{}'", self.allow_origins.join(","))),
        );
        parameters.insert(
            "method.response.header.Access-Control-Allow-Methods".into(),
            json!(format!("'{}'", methods.join(","))),
        );
        if let Some(secs) = self.max_age_secs {
            parameters.insert(
                "method.response.header.Access-Control-Max-Age".into(),
                json!(format!("'{secs}'")),
            );
        }
        Value::Object(parameters)
    }

    fn preflight_json(&self) -> (Value, Value) {
        let parameters = self.response_parameters();
        let declared: Map<String, Value> = parameters
            .as_object()
            .map(|map| map.keys().map(|key| (key.clone(), json!(true))).collect())
            .unwrap_or_default();
        let integration = json!({
            "Type": "MOCK",
            "RequestTemplates": { "application/json": "{ statusCode: 200 }" },
            "IntegrationResponses": [{ "StatusCode": "204", "ResponseParameters": parameters }],
        });
        let responses = json!([{ "StatusCode": "204", "ResponseParameters": declared }]);
        (integration, responses)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiConfig {
    pub rest_api_name: Option<String>,
    pub deploy: bool,
    pub deploy_options: Option<StageOptions>,
    pub endpoint_types: Vec<EndpointType>,
    pub fail_on_warnings: bool,
    pub cors: Option<CorsOptions>,
}

impl RestApiConfig {
    /// A deployed API on stage `stage_name`.
    pub fn deployed(stage_name: impl Into<String>) -> Self {
        Self {
            rest_api_name: None,
            deploy: true,
            deploy_options: Some(StageOptions {
                stage_name: stage_name.into(),
            }),
            endpoint_types: Vec::new(),
            fail_on_warnings: false,
            cors: None,
        }
    }

    /// An API with no deployment or stage.
    pub fn undeployed() -> Self {
        Self {
            rest_api_name: None,
            deploy: false,
            deploy_options: None,
            endpoint_types: Vec::new(),
            fail_on_warnings: false,
            cors: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RestApiKind;

impl ResourceKind for RestApiKind {
    type Config = RestApiConfig;
    type Handle = RestApiHandle;

    fn type_name(&self) -> &'static str {
        REST_API_TYPE
    }

    fn construct(&self, ctx: &ConstructContext<'_>, config: RestApiConfig) -> Result<RestApiHandle, BoxError> {
        match (config.deploy, &config.deploy_options) {
            (true, None) => {
                return Err(ResourceError::invalid("rest api", "deploy_options", "a stage is required when deploying").into())
            }
            (true, Some(stage)) if stage.stage_name.is_empty() => {
                return Err(ResourceError::invalid("rest api", "deploy_options", "stage name is empty").into())
            }
            (false, Some(_)) => {
                return Err(ResourceError::invalid(
                    "rest api",
                    "deploy_options",
                    "deploy options are not allowed when not deploying",
                )
                .into())
            }
            _ => {}
        }
        if let Some(cors) = &config.cors {
            if cors.allow_origins.is_empty() {
                return Err(ResourceError::invalid("rest api", "cors", "no allowed origins").into());
            }
        }

        let id = ctx.logical_id().to_string();
        let name = config.rest_api_name.clone().unwrap_or_else(|| ctx.name().to_string());
        if config.cors.is_some() {
            ctx.reserve_child(&format!("Root{}", HttpMethod::Options))?;
        }
        if let Some(stage) = &config.deploy_options {
            ctx.reserve_child("Deployment")?;
            ctx.reserve_child(&format!("DeploymentStage{}", stage.stage_name))?;
        }

        let tree = RouteTree {
            api_id: id.clone(),
            owner: ctx.name().to_string(),
            identifiers: ctx.identifiers(),
            cors: config.cors.is_some(),
            nodes: vec![RouteNode {
                id: format!("{id}Root"),
                path: "/".to_string(),
                path_part: String::new(),
                parent: None,
                children: Vec::new(),
                methods: Vec::new(),
            }],
        };

        Ok(RestApiHandle {
            id,
            name,
            env: ctx.env().clone(),
            config,
            tree: Rc::new(RefCell::new(tree)),
        })
    }
}

#[derive(Debug)]
struct RouteNode {
    id: String,
    path: String,
    path_part: String,
    parent: Option<usize>,
    children: Vec<usize>,
    methods: Vec<(HttpMethod, Rc<LambdaIntegration>)>,
}

impl RouteTree {
    /// Claims every id in `ids`, or none of them.
    fn claim(&self, ids: &[String], label: &str) -> Result<(), ResourceError> {
        let owner = format!("{} {label}", self.owner);
        for (claimed, id) in ids.iter().enumerate() {
            if let Err(err) = self.identifiers.reserve(id, &owner) {
                for taken in &ids[..claimed] {
                    self.identifiers.release(taken);
                }
                return Err(ResourceError::IdentifierTaken {
                    id: id.clone(),
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl RouteNode {
    fn method_id(&self, method: HttpMethod) -> String {
        format!("{}{}", self.id, method.as_str())
    }
}

#[derive(Debug)]
struct RouteTree {
    api_id: String,
    /// Definition name the claimed ids are attributed to.
    owner: String,
    identifiers: IdentifierRegistry,
    cors: bool,
    nodes: Vec<RouteNode>,
}

/// A node of an API's route tree. Clones refer to the same node.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    tree: Rc<RefCell<RouteTree>>,
    index: usize,
}

impl ResourceNode {
    /// Full path of the node, `/` for the root.
    pub fn path(&self) -> String {
        self.tree.borrow().nodes[self.index].path.clone()
    }

    /// Adds a child route. `path_part` is a literal segment, `{name}` or `{name+}`.
    pub fn add_resource(&self, path_part: &str) -> Result<ResourceNode, ResourceError> {
        let suffix = path_part_identifier(path_part)?;
        let mut tree = self.tree.borrow_mut();

        let parent = &tree.nodes[self.index];
        let path = if parent.parent.is_none() {
            format!("/{path_part}")
        } else {
            format!("{}/{path_part}", parent.path)
        };
        let duplicate = parent
            .children
            .iter()
            .any(|child| tree.nodes[*child].path_part == path_part);
        if duplicate {
            return Err(ResourceError::DuplicateRoute { path });
        }

        let id = if parent.parent.is_none() {
            format!("{}{suffix}", tree.api_id)
        } else {
            format!("{}{suffix}", parent.id)
        };
        let mut ids = vec![id.clone()];
        if tree.cors {
            ids.push(format!("{id}{}", HttpMethod::Options));
        }
        tree.claim(&ids, &path)?;

        let index = tree.nodes.len();
        debug!(api = %tree.api_id, %path, %id, "Route added");
        tree.nodes.push(RouteNode {
            id,
            path,
            path_part: path_part.to_string(),
            parent: Some(self.index),
            children: Vec::new(),
            methods: Vec::new(),
        });
        tree.nodes[self.index].children.push(index);

        Ok(ResourceNode {
            tree: self.tree.clone(),
            index,
        })
    }

    /// Routes `verb` on this node to `integration`.
    pub fn add_method(&self, verb: &str, integration: &Rc<LambdaIntegration>) -> Result<(), ResourceError> {
        let method: HttpMethod = verb.parse()?;
        let mut tree = self.tree.borrow_mut();
        let node = &tree.nodes[self.index];

        let taken = node.methods.iter().any(|(existing, _)| *existing == method);
        if taken || (tree.cors && method == HttpMethod::Options) {
            return Err(ResourceError::DuplicateMethod {
                verb: method.to_string(),
                path: node.path.clone(),
            });
        }
        let method_id = node.method_id(method);
        let label = format!("{method} {}", node.path);
        tree.claim(&[method_id.clone(), format!("{method_id}Permission")], &label)?;

        let node = &mut tree.nodes[self.index];
        debug!(path = %node.path, %method, "Method added");
        node.methods.push((method, integration.clone()));
        Ok(())
    }

    /// The existing child for `path_part`, if any.
    pub fn resource(&self, path_part: &str) -> Option<ResourceNode> {
        let tree = self.tree.borrow();
        tree.nodes[self.index]
            .children
            .iter()
            .find(|child| tree.nodes[**child].path_part == path_part)
            .map(|child| ResourceNode {
                tree: self.tree.clone(),
                index: *child,
            })
    }

    pub fn methods(&self) -> Vec<HttpMethod> {
        self.tree.borrow().nodes[self.index]
            .methods
            .iter()
            .map(|(method, _)| *method)
            .collect()
    }

    /// The integration `verb` is routed to on this node.
    pub fn method_integration(&self, verb: HttpMethod) -> Option<Rc<LambdaIntegration>> {
        self.tree.borrow().nodes[self.index]
            .methods
            .iter()
            .find(|(method, _)| *method == verb)
            .map(|(_, integration)| integration.clone())
    }
}

/// Validates a path part and returns its identifier segment.
fn path_part_identifier(path_part: &str) -> Result<String, ResourceError> {
    let invalid = || ResourceError::InvalidPathPart(path_part.to_string());
    if path_part.is_empty() || path_part.contains('/') {
        return Err(invalid());
    }

    let (name, suffix) = match path_part.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        Some(inner) => match inner.strip_suffix('+') {
            Some(greedy) => (greedy, "Proxy"),
            None => (inner, "Param"),
        },
        None if path_part.contains(RESERVED) => return Err(invalid()),
        None => (path_part, ""),
    };

    let sanitized = iaac_framework::sanitize_identifier(name);
    if sanitized.is_empty() || name.contains(RESERVED) {
        return Err(invalid());
    }
    let mut chars = sanitized.chars();
    let pascal: String = chars
        .next()
        .map(|first| first.to_ascii_uppercase())
        .into_iter()
        .chain(chars)
        .collect();
    Ok(format!("{pascal}{suffix}"))
}

#[derive(Debug)]
pub struct RestApiHandle {
    id: String,
    name: String,
    env: StackEnv,
    config: RestApiConfig,
    tree: Rc<RefCell<RouteTree>>,
}

impl RestApiHandle {
    pub fn config(&self) -> &RestApiConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> ResourceNode {
        ResourceNode {
            tree: self.tree.clone(),
            index: 0,
        }
    }

    /// Looks up a node by its full path, e.g. `/books/{any+}`.
    pub fn node(&self, path: &str) -> Option<ResourceNode> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root(), |node, part| node.resource(part))
    }

    pub fn rest_api_id(&self) -> Token {
        Token::reference(&self.id)
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.config.deploy_options.as_ref().map(|stage| stage.stage_name.as_str())
    }

    /// Invoke URL of the deployed stage.
    pub fn url(&self) -> Option<Token> {
        self.stage_name().map(|_| {
            Token::concat(vec![
                "https://".into(),
                self.rest_api_id(),
                ".execute-api.".into(),
                self.env.region_token(),
                ".".into(),
                Token::url_suffix(),
                "/".into(),
                Token::reference(self.stage_id()),
                "/".into(),
            ])
        })
    }

    fn deployment_id(&self) -> String {
        format!("{}Deployment", self.id)
    }

    fn stage_id(&self) -> String {
        let stage = self.stage_name().unwrap_or_default();
        format!("{}DeploymentStage{}", self.id, iaac_framework::sanitize_identifier(stage))
    }

    fn parent_id(&self, tree: &RouteTree, node: &RouteNode) -> Token {
        match node.parent {
            Some(0) | None => Token::get_att(&self.id, "RootResourceId"),
            Some(parent) => Token::reference(&tree.nodes[parent].id),
        }
    }

    fn resource_id(&self, node: &RouteNode) -> Token {
        match node.parent {
            None => Token::get_att(&self.id, "RootResourceId"),
            Some(_) => Token::reference(&node.id),
        }
    }

    /// `execute-api` ARN a permission is scoped to.
    fn source_arn(&self, method: HttpMethod, path: &str) -> Token {
        let stage = self.stage_name().unwrap_or("*");
        let verb = match method {
            HttpMethod::Any => "*",
            other => other.as_str(),
        };
        let path: Vec<&str> = path
            .split('/')
            .map(|part| if part.starts_with('{') { "*" } else { part })
            .collect();
        Token::concat(vec![
            "arn:".into(),
            Token::partition(),
            ":execute-api:".into(),
            self.env.region_token(),
            ":".into(),
            self.env.account_token(),
            ":".into(),
            self.rest_api_id(),
            format!("/{stage}/{verb}{}", path.join("/")).into(),
        ])
    }

    fn render_api(&self, template: &mut Template) -> Result<(), BoxError> {
        let mut properties = json!({ "Name": self.name });
        if !self.config.endpoint_types.is_empty() {
            properties["EndpointConfiguration"] = json!({ "Types": self.config.endpoint_types });
        }
        if self.config.fail_on_warnings {
            properties["FailOnWarnings"] = json!(true);
        }
        template.add_resource(&self.id, ResourceEntry::new(REST_API_TYPE, properties))?;
        Ok(())
    }

    /// Renders route nodes and methods; returns the method ids.
    fn render_routes(&self, template: &mut Template) -> Result<Vec<String>, BoxError> {
        let tree = self.tree.borrow();
        let mut method_ids = Vec::new();

        for node in &tree.nodes {
            if node.parent.is_some() {
                let properties = json!({
                    "ParentId": self.parent_id(&tree, node),
                    "PathPart": node.path_part,
                    "RestApiId": self.rest_api_id(),
                });
                template.add_resource(&node.id, ResourceEntry::new(API_RESOURCE_TYPE, properties))?;
            }

            for (method, integration) in &node.methods {
                let method_id = node.method_id(*method);
                let properties = json!({
                    "HttpMethod": method,
                    "ResourceId": self.resource_id(node),
                    "RestApiId": self.rest_api_id(),
                    "AuthorizationType": "NONE",
                    "Integration": integration.to_json(&self.env),
                });
                template.add_resource(&method_id, ResourceEntry::new(METHOD_TYPE, properties))?;

                let permission = json!({
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": integration.function().function_arn(),
                    "Principal": "apigateway.amazonaws.com",
                    "SourceArn": self.source_arn(*method, &node.path),
                });
                template.add_resource(
                    format!("{method_id}Permission"),
                    ResourceEntry::new(PERMISSION_TYPE, permission),
                )?;
                method_ids.push(method_id);
            }

            if let Some(cors) = &self.config.cors {
                let method_id = node.method_id(HttpMethod::Options);
                let (integration, responses) = cors.preflight_json();
                let properties = json!({
                    "HttpMethod": HttpMethod::Options,
                    "ResourceId": self.resource_id(node),
                    "RestApiId": self.rest_api_id(),
                    "AuthorizationType": "NONE",
                    "Integration": integration,
                    "MethodResponses": responses,
                });
                template.add_resource(&method_id, ResourceEntry::new(METHOD_TYPE, properties))?;
                method_ids.push(method_id);
            }
        }
        Ok(method_ids)
    }

    fn render_deployment(&self, template: &mut Template, method_ids: Vec<String>) -> Result<(), BoxError> {
        let Some(stage) = self.stage_name() else {
            return Ok(());
        };

        let deployment = ResourceEntry::new(
            DEPLOYMENT_TYPE,
            json!({ "RestApiId": self.rest_api_id(), "Description": "Automatically created by the RestApi construct" }),
        );
        let deployment = method_ids.into_iter().fold(deployment, |entry, id| entry.depends_on(id));
        template.add_resource(self.deployment_id(), deployment)?;

        let properties = json!({
            "RestApiId": self.rest_api_id(),
            "DeploymentId": Token::reference(self.deployment_id()),
            "StageName": stage,
        });
        template.add_resource(self.stage_id(), ResourceEntry::new(STAGE_TYPE, properties))?;

        if let Some(url) = self.url() {
            template.add_output(
                format!("{}Endpoint", self.id),
                OutputEntry {
                    value: url,
                    description: Some(format!("Invoke URL of {}", self.name)),
                },
            )?;
        }
        Ok(())
    }
}

impl Resource for RestApiHandle {
    fn logical_id(&self) -> &str {
        &self.id
    }

    fn render(&self, template: &mut Template) -> Result<(), BoxError> {
        self.render_api(template)?;
        let method_ids = self.render_routes(template)?;
        self.render_deployment(template, method_ids)
    }
}
