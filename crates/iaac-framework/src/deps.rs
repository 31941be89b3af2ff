//! # Dependency Lists
//!
//! A dependency list is a tuple of components. Resolving it joins each member
//! left to right against the same scope and collects the outputs into a tuple
//! of the same shape, which is what definitions and effect callbacks receive.
//! Because members are themselves components, resolution recurses through the
//! memo table and visits the dependency DAG in topological order.

use crate::builder::Component;
use crate::error::Result;
use crate::scope::Scope;

/// An explicit, ordered list of components.
pub trait Dependencies: 'static {
    /// Tuple of the members' outputs.
    type Resolved: 'static;

    fn resolve(&self, scope: &Scope) -> Result<Self::Resolved>;

    fn names(&self) -> Vec<String>;
}

impl Dependencies for () {
    type Resolved = ();

    fn resolve(&self, _scope: &Scope) -> Result<()> {
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

macro_rules! tuple_dependencies {
    ($($member:ident),+) => {
        paste::paste! {
            impl<$($member: Component + 'static),+> Dependencies for ($($member,)+) {
                type Resolved = ($($member::Output,)+);

                fn resolve(&self, scope: &Scope) -> Result<Self::Resolved> {
                    let ($([<$member:lower>],)+) = self;
                    Ok(($([<$member:lower>].join(scope)?,)+))
                }

                fn names(&self) -> Vec<String> {
                    let ($([<$member:lower>],)+) = self;
                    vec![$([<$member:lower>].name().to_string()),+]
                }
            }
        }
    };
}

tuple_dependencies!(A);
tuple_dependencies!(A, B);
tuple_dependencies!(A, B, C);
tuple_dependencies!(A, B, C, D);
tuple_dependencies!(A, B, C, D, E);
tuple_dependencies!(A, B, C, D, E, F);
tuple_dependencies!(A, B, C, D, E, F, G);
tuple_dependencies!(A, B, C, D, E, F, G, H);
