//! # ResourceKind Trait
//!
//! The `ResourceKind` trait is the constructor capability a builder is bound to.
//! A kind is a value (usually a unit struct, sometimes a stateful test double)
//! that turns a configuration struct into a handle. The engine never looks
//! inside configurations or handles; it only decides *when* and *how often* a
//! kind's constructor runs.
//!
//! Handles implement [`Resource`], which lets synthesis ask each constructed
//! resource to render itself into the [`Template`].

use crate::env::StackEnv;
use crate::error::{BoxError, Result as CompositionResult};
use crate::scope::{IdentifierRegistry, Scope};
use crate::template::Template;
use std::cell::RefCell;

/// A constructor capability for one kind of infrastructure resource.
///
/// # Contract
/// `construct` validates the configuration and either returns a handle or a
/// construction error. It must not touch the scope beyond what the context
/// exposes; the engine registers the returned handle itself. It is called at
/// most once per (scope, builder) pair.
pub trait ResourceKind: 'static {
    /// Statically enumerated configuration; required fields are plain fields.
    type Config;

    /// The resolved handle downstream definitions and effects consume.
    type Handle: Resource;

    /// Template type name, e.g. `AWS::DynamoDB::Table`.
    fn type_name(&self) -> &'static str;

    /// Instantiates the resource.
    fn construct(
        &self,
        ctx: &ConstructContext<'_>,
        config: Self::Config,
    ) -> Result<Self::Handle, BoxError>;
}

/// A constructed resource that knows how to render itself.
pub trait Resource: 'static {
    /// The logical identifier the engine assigned at construction.
    fn logical_id(&self) -> &str;

    /// Writes this resource (and any resources it owns) into the template.
    fn render(&self, template: &mut Template) -> Result<(), BoxError>;
}

/// What a constructor may know about where it is being instantiated.
pub struct ConstructContext<'a> {
    scope: &'a Scope,
    logical_id: &'a str,
    name: &'a str,
    reserved: RefCell<Vec<String>>,
}

impl<'a> ConstructContext<'a> {
    pub(crate) fn new(scope: &'a Scope, logical_id: &'a str, name: &'a str) -> Self {
        Self {
            scope,
            logical_id,
            name,
            reserved: RefCell::new(Vec::new()),
        }
    }

    /// Ids claimed through [`reserve_child`](Self::reserve_child).
    pub(crate) fn into_reserved(self) -> Vec<String> {
        self.reserved.into_inner()
    }

    pub fn logical_id(&self) -> &str {
        self.logical_id
    }

    /// The definition name the builder was declared with.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn scope_path(&self) -> String {
        self.scope.path()
    }

    pub fn stack_name(&self) -> &str {
        self.scope.stack_name()
    }

    pub fn env(&self) -> &StackEnv {
        self.scope.env()
    }

    /// Derives the identifier of a resource owned by this one.
    pub fn child_id(&self, suffix: &str) -> String {
        format!("{}{}", self.logical_id, sanitize_identifier(suffix))
    }

    /// Derives and claims the identifier of a resource owned by this one.
    ///
    /// Claims are released again if construction fails.
    pub fn reserve_child(&self, suffix: &str) -> CompositionResult<String> {
        let id = self.child_id(suffix);
        self.scope
            .reserve_identifier(&id, &format!("{}/{}", self.name, suffix))?;
        self.reserved.borrow_mut().push(id.clone());
        Ok(id)
    }

    /// The registry for sub-resources registered after construction.
    pub fn identifiers(&self) -> IdentifierRegistry {
        self.scope.identifiers()
    }
}

/// Keeps only ASCII alphanumerics, the character set logical ids allow.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}
