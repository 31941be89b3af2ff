//! # Output Adapter
//!
//! [`wrap`] re-describes a component's output as a different capability, such
//! as presenting a function handle as an API integration. The inner component
//! is joined through the normal memoized path, so an adapted view never causes
//! a second construction. The adapted value is memoized as well: joining the
//! same adapter twice in a scope returns the identical `Rc`.

use crate::builder::Component;
use crate::error::Result;
use crate::scope::{MemoKey, Scope};
use std::rc::Rc;
use tracing::trace;

/// Returns a function that wraps a component with `adapter`.
///
/// `adapter` must be pure and must not construct resources.
pub fn wrap<C, O, F>(adapter: F) -> impl FnOnce(C) -> Adapted<C, O>
where
    C: Component + 'static,
    O: 'static,
    F: Fn(&C::Output) -> O + 'static,
{
    move |component: C| Adapted::new(component, adapter)
}

struct AdaptedInner<C: Component, O> {
    component: C,
    adapter: Box<dyn Fn(&C::Output) -> O>,
}

/// A component viewed through an adapter.
pub struct Adapted<C: Component, O> {
    inner: Rc<AdaptedInner<C, O>>,
}

impl<C: Component, O> Clone for Adapted<C, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C, O> Adapted<C, O>
where
    C: Component + 'static,
    O: 'static,
{
    pub fn new<F>(component: C, adapter: F) -> Self
    where
        F: Fn(&C::Output) -> O + 'static,
    {
        Self {
            inner: Rc::new(AdaptedInner {
                component,
                adapter: Box::new(adapter),
            }),
        }
    }

    /// The wrapped component.
    pub fn inner(&self) -> &C {
        &self.inner.component
    }
}

impl<C, O> Component for Adapted<C, O>
where
    C: Component + 'static,
    O: 'static,
{
    type Output = Rc<O>;

    fn name(&self) -> &str {
        self.inner.component.name()
    }

    fn join(&self, scope: &Scope) -> Result<Rc<O>> {
        let key = MemoKey::of(&self.inner);
        if let Some(view) = scope.recall::<Rc<O>>(key, self.name())? {
            return Ok(view);
        }

        let resolved = self.inner.component.join(scope)?;
        let view = Rc::new((self.inner.adapter)(&resolved));
        scope.remember(key, self.inner.clone(), view.clone());
        trace!(scope = %scope.path(), name = self.name(), "Adapted");
        Ok(view)
    }
}
