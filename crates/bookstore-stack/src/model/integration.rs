//! Function-to-API integration.
//!
//! An integration is not a resource of its own: it is a function handle viewed
//! as something a route can point at. [`lambda_integration`] builds that view
//! with [`wrap`], so joining it never constructs a second function, and every
//! route that receives the joined `Rc<LambdaIntegration>` shares one object.

use crate::model::{FunctionHandle, FunctionKind};
use iaac_framework::{wrap, Adapted, Builder, Dependencies, StackEnv, Token};
use serde_json::{json, Value};
use std::rc::Rc;

/// Version segment of the invocation path.
const INVOKE_API_VERSION: &str = "2015-03-31";

/// A function presented as an `AWS_PROXY` route target.
#[derive(Debug)]
pub struct LambdaIntegration {
    function: Rc<FunctionHandle>,
}

impl LambdaIntegration {
    pub fn new(function: Rc<FunctionHandle>) -> Self {
        Self { function }
    }

    pub fn function(&self) -> &Rc<FunctionHandle> {
        &self.function
    }

    /// Invocation URI the API calls.
    pub fn uri(&self, env: &StackEnv) -> Token {
        Token::concat(vec![
            "arn:".into(),
            Token::partition(),
            ":apigateway:".into(),
            env.region_token(),
            format!(":lambda:path/{INVOKE_API_VERSION}/functions/").into(),
            self.function.function_arn(),
            "/invocations".into(),
        ])
    }

    /// The `Integration` block of a method using this target.
    pub(crate) fn to_json(&self, env: &StackEnv) -> Value {
        json!({
            "Type": "AWS_PROXY",
            "IntegrationHttpMethod": "POST",
            "Uri": self.uri(env),
        })
    }
}

/// A function builder adapted into an integration.
pub type FunctionIntegration<D> = Adapted<Builder<FunctionKind, D>, LambdaIntegration>;

/// Wraps a function builder as an API integration.
pub fn lambda_integration<D: Dependencies>(
    function: Builder<FunctionKind, D>,
) -> FunctionIntegration<D> {
    wrap(|function: &Rc<FunctionHandle>| LambdaIntegration::new(function.clone()))(function)
}
