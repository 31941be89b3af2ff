//! # Factory Wrapper and Scope Joiner
//!
//! [`iaac`] binds a resource kind to a definition and yields a [`Builder`]. A
//! builder does nothing until it is passed to [`join`], which instantiates it in
//! a scope exactly once and hands back the shared handle on every later call.
//!
//! ```rust
//! use iaac_framework::mock::{MockConfig, MockKind};
//! use iaac_framework::{iaac, join, Stack, StackEnv};
//! use std::rc::Rc;
//!
//! let kind = MockKind::new();
//! let storage = iaac(kind.clone()).define("Storage", |_| Ok(MockConfig::labelled("table")));
//!
//! let stack = Stack::new("demo", StackEnv::default());
//! let first = join(&stack, &storage)?;
//! let second = join(&stack, &storage)?;
//!
//! assert!(Rc::ptr_eq(&first, &second));
//! assert_eq!(kind.constructions(), 1);
//! # Ok::<(), iaac_framework::CompositionError>(())
//! ```

use crate::deps::Dependencies;
use crate::error::{BoxError, CompositionError, Result};
use crate::kind::{ConstructContext, ResourceKind};
use crate::scope::{MemoKey, Scope};
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

/// Anything that can be instantiated against a scope.
///
/// Builders, adapted builders and effects all implement this trait, so any of
/// them can appear in a dependency list.
pub trait Component {
    /// What joining yields. Cloning must be cheap and preserve identity.
    type Output: Clone + 'static;

    /// The logical name used for identifiers, logging and errors.
    fn name(&self) -> &str;

    /// Instantiates the component in `scope`, or returns the memoized result.
    fn join(&self, scope: &Scope) -> Result<Self::Output>;
}

/// Instantiates `component` against `scope` (a [`Scope`] or a [`Stack`](crate::Stack)).
pub fn join<S, C>(scope: &S, component: &C) -> Result<C::Output>
where
    S: AsRef<Scope> + ?Sized,
    C: Component + ?Sized,
{
    component.join(scope.as_ref())
}

/// Binds a resource kind, producing a [`Factory`] awaiting its definition.
pub fn iaac<K: ResourceKind>(kind: K) -> Factory<K, ()> {
    Factory { kind, deps: () }
}

/// A kind plus its dependency list, waiting for a definition.
pub struct Factory<K, D> {
    kind: K,
    deps: D,
}

impl<K: ResourceKind, D: Dependencies> Factory<K, D> {
    /// Declares the components the definition reads. They are resolved in
    /// order, through the memo table, before the definition runs.
    pub fn after<E: Dependencies>(self, deps: E) -> Factory<K, E> {
        Factory {
            kind: self.kind,
            deps,
        }
    }

    /// Attaches the definition and yields the builder.
    ///
    /// The definition must be pure: the same resolved dependencies must give
    /// the same configuration, with no side effects.
    pub fn define<F>(self, name: impl Into<String>, definition: F) -> Builder<K, D>
    where
        F: Fn(&D::Resolved) -> std::result::Result<K::Config, BoxError> + 'static,
    {
        let name = name.into();
        debug!(name = %name, kind = self.kind.type_name(), deps = ?self.deps.names(), "Builder declared");
        Builder {
            inner: Rc::new(BuilderInner {
                name,
                kind: self.kind,
                deps: self.deps,
                definition: Box::new(definition),
            }),
        }
    }
}

type Definition<K, D> = dyn Fn(&<D as Dependencies>::Resolved) -> std::result::Result<<K as ResourceKind>::Config, BoxError>;

struct BuilderInner<K: ResourceKind, D: Dependencies> {
    name: String,
    kind: K,
    deps: D,
    definition: Box<Definition<K, D>>,
}

/// A lazy, memoized factory for one resource.
///
/// Clones share identity: joining any clone in a scope yields the same handle.
pub struct Builder<K: ResourceKind, D: Dependencies = ()> {
    inner: Rc<BuilderInner<K, D>>,
}

impl<K: ResourceKind, D: Dependencies> Clone for Builder<K, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: ResourceKind, D: Dependencies> Builder<K, D> {
    pub fn kind(&self) -> &K {
        &self.inner.kind
    }

    pub fn dependency_names(&self) -> Vec<String> {
        self.inner.deps.names()
    }

    /// True when both builders share identity.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Evaluates the definition without constructing this resource.
    ///
    /// Dependencies are still joined (through the memo table) because the
    /// definition needs their handles.
    pub fn probe(&self, scope: &Scope) -> Result<K::Config> {
        let resolved = self.inner.deps.resolve(scope)?;
        self.evaluate(scope, &resolved)
    }

    fn evaluate(&self, scope: &Scope, resolved: &D::Resolved) -> Result<K::Config> {
        (self.inner.definition)(resolved).map_err(|source| {
            warn!(scope = %scope.path(), name = %self.inner.name, error = %source, "Definition failed");
            CompositionError::Definition {
                name: self.inner.name.clone(),
                source,
            }
        })
    }
}

impl<K: ResourceKind, D: Dependencies> Component for Builder<K, D> {
    type Output = Rc<K::Handle>;

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn join(&self, scope: &Scope) -> Result<Rc<K::Handle>> {
        let name = self.inner.name.as_str();
        let key = MemoKey::of(&self.inner);
        if let Some(handle) = scope.recall::<Rc<K::Handle>>(key, name)? {
            trace!(scope = %scope.path(), name, "Memo hit");
            return Ok(handle);
        }

        let resolved = self.inner.deps.resolve(scope)?;
        let config = self.evaluate(scope, &resolved)?;

        let id = scope.logical_id(name);
        scope.reserve_identifier(&id, name)?;

        let ctx = ConstructContext::new(scope, &id, name);
        let constructed = self.inner.kind.construct(&ctx, config);
        let handle = match constructed {
            Ok(handle) => Rc::new(handle),
            Err(source) => {
                for child in ctx.into_reserved() {
                    scope.release_identifier(&child);
                }
                scope.release_identifier(&id);
                warn!(scope = %scope.path(), name, %id, error = %source, "Construction failed");
                return Err(CompositionError::Construction {
                    scope: scope.path(),
                    name: name.to_string(),
                    source,
                });
            }
        };

        scope.adopt(handle.clone());
        scope.remember(key, self.inner.clone(), handle.clone());
        info!(scope = %scope.path(), name, %id, kind = self.inner.kind.type_name(), "Constructed");
        Ok(handle)
    }
}
