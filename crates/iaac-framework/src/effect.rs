//! # Effect Composer
//!
//! Cross-resource wiring, such as pointing an API route at a function, needs
//! several handles at once and must happen after all of them exist. [`uses`]
//! names the components, [`Uses::effect`] attaches the callback, and joining the
//! resulting [`Effect`] resolves every component (memoized, so handles shared
//! with other joins are the same instances) before running the callback once.
//!
//! ```rust
//! use iaac_framework::mock::{MockConfig, MockKind};
//! use iaac_framework::{iaac, join, uses, Stack, StackEnv};
//!
//! let kind = MockKind::new();
//! let queue = iaac(kind.clone()).define("Queue", |_| Ok(MockConfig::labelled("queue")));
//! let worker = iaac(kind.clone()).define("Worker", |_| Ok(MockConfig::labelled("worker")));
//!
//! let subscription = uses((queue.clone(), worker.clone())).effect(|(queue, worker)| {
//!     worker.connect(queue.id());
//!     Ok(())
//! });
//!
//! let stack = Stack::new("demo", StackEnv::default());
//! join(&stack, &subscription)?;
//! join(&stack, &subscription)?;
//!
//! let worker = join(&stack, &worker)?;
//! assert_eq!(worker.connections(), vec!["Queue".to_string()]);
//! # Ok::<(), iaac_framework::CompositionError>(())
//! ```
//!
//! A callback failure taints the whole stack: its wiring may be half applied,
//! so [`Stack::synth`](crate::Stack::synth) refuses to run afterwards. Joining
//! the failed effect again reports [`CompositionError::Tainted`] without
//! calling the callback.

use crate::builder::Component;
use crate::deps::Dependencies;
use crate::error::{BoxError, CompositionError, Result};
use crate::scope::{MemoKey, Scope};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Names the components an effect needs.
pub fn uses<D: Dependencies>(deps: D) -> Uses<D> {
    Uses { deps }
}

/// Intermediate value of [`uses`], waiting for its callback.
pub struct Uses<D> {
    deps: D,
}

impl<D: Dependencies> Uses<D> {
    /// Attaches the wiring callback.
    ///
    /// The callback may call methods on the handles it receives but must not
    /// construct top-level resources; those belong in definitions.
    pub fn effect<F>(self, callback: F) -> Effect<D>
    where
        F: Fn(&D::Resolved) -> std::result::Result<(), BoxError> + 'static,
    {
        let names = self.deps.names();
        let label = format!("effect({})", names.join(", "));
        Effect {
            inner: Rc::new(EffectInner {
                label,
                names,
                deps: self.deps,
                callback: Box::new(callback),
            }),
        }
    }
}

type Callback<D> = dyn Fn(&<D as Dependencies>::Resolved) -> std::result::Result<(), BoxError>;

struct EffectInner<D: Dependencies> {
    label: String,
    names: Vec<String>,
    deps: D,
    callback: Box<Callback<D>>,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Applied,
    Failed,
}

/// A deferred wiring step, applied at most once per scope.
pub struct Effect<D: Dependencies> {
    inner: Rc<EffectInner<D>>,
}

impl<D: Dependencies> Clone for Effect<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Dependencies> Effect<D> {
    /// Names of the components the callback receives, in order.
    pub fn dependency_names(&self) -> &[String] {
        &self.inner.names
    }
}

impl<D: Dependencies> Component for Effect<D> {
    type Output = ();

    fn name(&self) -> &str {
        &self.inner.label
    }

    fn join(&self, scope: &Scope) -> Result<()> {
        let key = MemoKey::of(&self.inner);
        match scope.recall::<Outcome>(key, self.name())? {
            Some(Outcome::Applied) => {
                debug!(scope = %scope.path(), effect = self.name(), "Already applied");
                return Ok(());
            }
            Some(Outcome::Failed) => {
                return Err(CompositionError::Tainted {
                    stack: scope.stack_name().to_string(),
                });
            }
            None => {}
        }

        let resolved = self.inner.deps.resolve(scope)?;
        if let Err(source) = (self.inner.callback)(&resolved) {
            // Partial wiring may remain on the handles
            scope.remember(key, self.inner.clone(), Outcome::Failed);
            scope.taint();
            warn!(scope = %scope.path(), effect = self.name(), error = %source, "Effect failed");
            return Err(CompositionError::Effect {
                names: self.inner.names.clone(),
                source,
            });
        }

        scope.remember(key, self.inner.clone(), Outcome::Applied);
        info!(scope = %scope.path(), effect = self.name(), "Effect applied");
        Ok(())
    }
}
