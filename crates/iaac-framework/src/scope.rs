//! # Scopes and the Stack Root
//!
//! A [`Scope`] is a node of the construct tree. It owns the memo table that
//! makes builders singletons, the ordered list of resources constructed in it,
//! and its nested child scopes. A [`Stack`] owns the root scope and turns the
//! whole tree into a [`Template`].
//!
//! ## Ownership
//!
//! Parents own their children; children never point back at their parent. What
//! a child needs from the root (stack name, environment, the identifier
//! registry, the taint flag) lives in a shared `StackState` instead, so the
//! tree has no reference cycles.
//!
//! ## Memoization
//!
//! The memo table is keyed by component identity: the address of the
//! component's shared inner state. Each entry also holds a clone of that state
//! (the *anchor*), so the address cannot be reused while the entry lives.
//! Composition is single-threaded; the table is a plain `RefCell`, and no
//! borrow is ever held across a recursive join.

use crate::env::StackEnv;
use crate::error::{CompositionError, Result};
use crate::kind::{sanitize_identifier, Resource};
use crate::template::Template;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Identity of a joinable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey(usize);

impl MemoKey {
    pub(crate) fn of<T>(inner: &Rc<T>) -> Self {
        Self(Rc::as_ptr(inner) as usize)
    }
}

struct MemoEntry {
    _anchor: Rc<dyn Any>,
    value: Box<dyn Any>,
}

struct StackState {
    name: String,
    env: StackEnv,
    /// logical id -> owner (scope path and definition name)
    identifiers: RefCell<BTreeMap<String, String>>,
    tainted: Cell<bool>,
}

struct ScopeNode {
    /// Path below the root; empty for the root itself.
    segments: Vec<String>,
    stack: Rc<StackState>,
    memo: RefCell<HashMap<MemoKey, MemoEntry>>,
    resources: RefCell<Vec<Rc<dyn Resource>>>,
    children: RefCell<Vec<Scope>>,
}

/// A node of the construct tree. Cloning shares the node.
#[derive(Clone)]
pub struct Scope {
    node: Rc<ScopeNode>,
}

impl Scope {
    fn root(name: String, env: StackEnv) -> Self {
        let stack = Rc::new(StackState {
            name,
            env,
            identifiers: RefCell::new(BTreeMap::new()),
            tainted: Cell::new(false),
        });
        Self::with_segments(stack, Vec::new())
    }

    fn with_segments(stack: Rc<StackState>, segments: Vec<String>) -> Self {
        Self {
            node: Rc::new(ScopeNode {
                segments,
                stack,
                memo: RefCell::new(HashMap::new()),
                resources: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The last path segment; the stack name for the root.
    pub fn name(&self) -> &str {
        self.node
            .segments
            .last()
            .map_or(self.node.stack.name.as_str(), String::as_str)
    }

    /// Slash-separated path from the stack root, e.g. `bookstore/Api`.
    pub fn path(&self) -> String {
        std::iter::once(self.node.stack.name.as_str())
            .chain(self.node.segments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn stack_name(&self) -> &str {
        &self.node.stack.name
    }

    pub fn env(&self) -> &StackEnv {
        &self.node.stack.env
    }

    /// Creates a child scope. Sibling names must be unique.
    pub fn nested(&self, name: &str) -> Result<Scope> {
        if sanitize_identifier(name).is_empty() {
            return Err(CompositionError::InvalidIdentifier {
                name: name.to_string(),
            });
        }

        let mut children = self.node.children.borrow_mut();
        if let Some(existing) = children.iter().find(|child| child.name() == name) {
            return Err(CompositionError::IdentifierCollision {
                id: existing.path(),
                existing: existing.path(),
                requested: format!("{}/{}", self.path(), name),
            });
        }

        let mut segments = self.node.segments.clone();
        segments.push(name.to_string());
        let child = Scope::with_segments(self.node.stack.clone(), segments);
        debug!(scope = %child.path(), "Nested scope created");
        children.push(child.clone());
        Ok(child)
    }

    pub fn children(&self) -> Vec<Scope> {
        self.node.children.borrow().clone()
    }

    /// Logical ids of the resources constructed directly in this scope, in
    /// construction order.
    pub fn resource_ids(&self) -> Vec<String> {
        self.node
            .resources
            .borrow()
            .iter()
            .map(|resource| resource.logical_id().to_string())
            .collect()
    }

    /// True once any effect in the stack has failed.
    pub fn is_tainted(&self) -> bool {
        self.node.stack.tainted.get()
    }

    pub fn same_as(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn taint(&self) {
        self.node.stack.tainted.set(true);
    }

    /// Derives the logical id of `name` from the path below the root.
    pub(crate) fn logical_id(&self, name: &str) -> String {
        self.node
            .segments
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .map(sanitize_identifier)
            .collect()
    }

    /// Handle on the stack-wide identifier registry, attributed to this scope.
    pub(crate) fn identifiers(&self) -> IdentifierRegistry {
        IdentifierRegistry {
            stack: self.node.stack.clone(),
            scope_path: self.path(),
        }
    }

    pub(crate) fn reserve_identifier(&self, id: &str, name: &str) -> Result<()> {
        self.identifiers().reserve(id, name)
    }

    pub(crate) fn release_identifier(&self, id: &str) {
        self.identifiers().release(id);
    }

    pub(crate) fn recall<T: Clone + 'static>(&self, key: MemoKey, name: &str) -> Result<Option<T>> {
        match self.node.memo.borrow().get(&key) {
            None => Ok(None),
            Some(entry) => entry
                .value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| CompositionError::MemoType {
                    name: name.to_string(),
                }),
        }
    }

    pub(crate) fn remember<T: 'static>(&self, key: MemoKey, anchor: Rc<dyn Any>, value: T) {
        self.node.memo.borrow_mut().insert(
            key,
            MemoEntry {
                _anchor: anchor,
                value: Box::new(value),
            },
        );
    }

    pub(crate) fn adopt(&self, resource: Rc<dyn Resource>) {
        self.node.resources.borrow_mut().push(resource);
    }

    fn render_into(&self, template: &mut Template) -> Result<()> {
        for resource in self.node.resources.borrow().iter() {
            resource
                .render(template)
                .map_err(|source| CompositionError::Render {
                    id: resource.logical_id().to_string(),
                    source,
                })?;
        }
        for child in self.node.children.borrow().iter() {
            child.render_into(template)?;
        }
        Ok(())
    }
}

/// The stack-wide registry of logical ids.
///
/// Resources that own sub-resources claim their ids here, including ids of
/// sub-resources registered after construction, such as API routes. Holds no
/// reference to the scope tree.
#[derive(Clone)]
pub struct IdentifierRegistry {
    stack: Rc<StackState>,
    scope_path: String,
}

impl IdentifierRegistry {
    /// Claims `id` for `name`, or fails with
    /// [`CompositionError::IdentifierCollision`] if another owner holds it.
    pub fn reserve(&self, id: &str, name: &str) -> Result<()> {
        let requested = format!("{}/{}", self.scope_path, name);
        if id.is_empty() || sanitize_identifier(name).is_empty() {
            return Err(CompositionError::InvalidIdentifier { name: requested });
        }

        let mut identifiers = self.stack.identifiers.borrow_mut();
        if let Some(existing) = identifiers.get(id) {
            warn!(id, existing = %existing, requested = %requested, "Identifier collision");
            return Err(CompositionError::IdentifierCollision {
                id: id.to_string(),
                existing: existing.clone(),
                requested,
            });
        }
        identifiers.insert(id.to_string(), requested);
        Ok(())
    }

    pub fn release(&self, id: &str) {
        self.stack.identifiers.borrow_mut().remove(id);
    }
}

impl std::fmt::Debug for IdentifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierRegistry")
            .field("stack", &self.stack.name)
            .field("scope_path", &self.scope_path)
            .finish()
    }
}

impl AsRef<Scope> for Scope {
    fn as_ref(&self) -> &Scope {
        self
    }
}

/// The root scope of a construct tree, created once per process.
pub struct Stack {
    root: Scope,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: StackEnv) -> Self {
        let name = name.into();
        info!(stack = %name, account = ?env.account, region = ?env.region, "Stack created");
        Self {
            root: Scope::root(name, env),
        }
    }

    pub fn name(&self) -> &str {
        self.root.stack_name()
    }

    pub fn scope(&self) -> &Scope {
        &self.root
    }

    pub fn env(&self) -> &StackEnv {
        self.root.env()
    }

    /// Walks the scope tree depth-first in creation order and renders every
    /// constructed resource.
    ///
    /// Fails with [`CompositionError::Tainted`] if any effect has failed,
    /// since its wiring may be half applied.
    pub fn synth(&self) -> Result<Template> {
        if self.root.is_tainted() {
            warn!(stack = %self.name(), "Refusing to synthesize a tainted stack");
            return Err(CompositionError::Tainted {
                stack: self.name().to_string(),
            });
        }

        let mut template = Template::new();
        self.root.render_into(&mut template)?;
        info!(stack = %self.name(), resources = template.len(), "Synthesized");
        Ok(template)
    }

    /// Synthesizes and writes `<dir>/<stack>.template.json`.
    pub fn synth_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let template = self.synth()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.template.json", self.name()));
        let mut json = template.to_json_pretty()?;
        json.push('\n');
        std::fs::write(&path, json)?;
        info!(path = %path.display(), "Template written");
        Ok(path)
    }
}

impl AsRef<Scope> for Stack {
    fn as_ref(&self) -> &Scope {
        &self.root
    }
}
