use crate::blueprint::{
    self, GatewayBuilder, IntegrationBuilder, LambdaBuilder, RoleBuilder, RoutesEffect, StorageBuilder,
};
use crate::model::{HandlerAsset, Runtime};
use iaac_framework::{join, CompositionError, Resource, Stack, StackEnv, Template};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default stack name.
pub const DEFAULT_STACK_NAME: &str = "bookstore";
/// Entry point of the prebuilt handler.
pub const HANDLER: &str = "main";

/// Everything the stack needs from the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSettings {
    pub stack_name: String,
    pub env: StackEnv,
    /// Path of the prebuilt handler package.
    pub asset: PathBuf,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            env: StackEnv::default(),
            asset: PathBuf::from("."),
        }
    }
}

impl StackSettings {
    /// Default name and asset, target read from the process environment.
    pub fn from_env() -> Self {
        Self {
            env: StackEnv::from_env(),
            ..Self::default()
        }
    }
}

/// The bookstore service: a table, an execution role, a CRUD function and a
/// REST API routing `/books` to it.
///
/// The builders are public so callers can join them into [`BookstoreStack::stack`]
/// on their own; joins are memoized, so doing so never duplicates a resource.
pub struct BookstoreStack {
    pub stack: Stack,
    pub storage: StorageBuilder,
    pub role: RoleBuilder,
    pub lambda: LambdaBuilder,
    pub integration: IntegrationBuilder,
    pub gateway: GatewayBuilder,
    pub routes: RoutesEffect,
}

impl BookstoreStack {
    /// Creates the stack root and declares every builder. Nothing is constructed.
    pub fn new(settings: StackSettings) -> Self {
        let asset = HandlerAsset::new(settings.asset, HANDLER, Runtime::Go1x);

        let storage = blueprint::storage();
        let role = blueprint::role(&storage);
        let lambda = blueprint::lambda(asset, &role, &storage);
        let integration = blueprint::integration(&lambda);
        let gateway = blueprint::gateway();
        let routes = blueprint::routes(&gateway, &integration);

        Self {
            stack: Stack::new(settings.stack_name, settings.env),
            storage,
            role,
            lambda,
            integration,
            gateway,
            routes,
        }
    }

    /// Declares and composes in one step.
    pub fn assemble(settings: StackSettings) -> Result<Self, CompositionError> {
        let stack = Self::new(settings);
        stack.compose()?;
        Ok(stack)
    }

    /// Joins the definitions into the stack root.
    pub fn compose(&self) -> Result<(), CompositionError> {
        let storage = join(&self.stack, &self.storage)?;
        let role = join(&self.stack, &self.role)?;
        join(&self.stack, &self.routes)?;
        info!(
            stack = %self.stack.name(),
            storage = storage.logical_id(),
            role = role.logical_id(),
            "Bookstore composed"
        );
        Ok(())
    }

    pub fn synth(&self) -> Result<Template, CompositionError> {
        self.stack.synth()
    }

    /// Writes `<dir>/<stack>.template.json` and returns its path.
    pub fn synth_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, CompositionError> {
        self.stack.synth_to(dir)
    }
}
