//! Isolate owners: the build or project identity a pass runs under.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::ServiceRef;

/// What kind of owner an isolate represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// A whole build (root or included).
    Build,
    /// A single project of a build.
    Project,
    /// A narrower service scope, e.g. a build service registration.
    Scope,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OwnerKind::Build => "build",
            OwnerKind::Project => "project",
            OwnerKind::Scope => "scope",
        };
        f.write_str(s)
    }
}

/// The ambient identity active during an encode or decode pass.
///
/// Decoders resolve owner-scoped services through the active owner instead of
/// caching them, so that a nested isolate (an included build inside the root
/// build) sees its own services.
pub trait IsolateOwner: Send + Sync {
    /// Kind of owner.
    fn kind(&self) -> OwnerKind;

    /// Human-readable identity, e.g. `build ':included'`.
    fn display_name(&self) -> String;

    /// Looks up a live service by name.
    fn service(&self, name: &str) -> Option<ServiceRef>;
}

/// A simple owner backed by a name → service table.
pub struct OwnerScope {
    kind: OwnerKind,
    path: String,
    services: HashMap<String, ServiceRef>,
}

impl OwnerScope {
    /// Creates an owner with no services.
    pub fn new(kind: OwnerKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            services: HashMap::new(),
        }
    }

    /// Shorthand for a build owner.
    pub fn build(path: impl Into<String>) -> Self {
        Self::new(OwnerKind::Build, path)
    }

    /// Shorthand for a project owner.
    pub fn project(path: impl Into<String>) -> Self {
        Self::new(OwnerKind::Project, path)
    }

    /// Registers a service under its own name.
    pub fn with_service(mut self, service: ServiceRef) -> Self {
        self.services.insert(service.name().to_string(), service);
        self
    }

    /// The owner's path, e.g. `:app`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl IsolateOwner for OwnerScope {
    fn kind(&self) -> OwnerKind {
        self.kind
    }

    fn display_name(&self) -> String {
        format!("{} '{}'", self.kind, self.path)
    }

    fn service(&self, name: &str) -> Option<ServiceRef> {
        self.services.get(name).cloned()
    }
}

/// Stack of active owners; the top is the current isolate.
#[derive(Default)]
pub struct IsolateStack {
    owners: Vec<Arc<dyn IsolateOwner>>,
}

impl IsolateStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters an isolate.
    pub fn push(&mut self, owner: Arc<dyn IsolateOwner>) {
        tracing::trace!(
            owner = %owner.display_name(),
            depth = self.owners.len() + 1,
            "enter isolate"
        );
        self.owners.push(owner);
    }

    /// Leaves the current isolate, returning to the enclosing one.
    pub fn pop(&mut self) -> Option<Arc<dyn IsolateOwner>> {
        self.owners.pop()
    }

    /// The owner of the innermost active isolate.
    pub fn current(&self) -> Option<&Arc<dyn IsolateOwner>> {
        self.owners.last()
    }

    /// Number of nested isolates.
    pub fn depth(&self) -> usize {
        self.owners.len()
    }
}

/// Contexts that carry an [`IsolateStack`] for the duration of a pass.
pub trait IsolateContext {
    /// The context's owner stack.
    fn isolates(&mut self) -> &mut IsolateStack;

    /// Runs `f` with `owner` as the active isolate, restoring the previous
    /// owner afterwards whether or not `f` succeeded.
    fn with_isolate<R>(&mut self, owner: Arc<dyn IsolateOwner>, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        self.isolates().push(owner);
        let result = f(self);
        self.isolates().pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        isolates: IsolateStack,
    }

    impl IsolateContext for Ctx {
        fn isolates(&mut self) -> &mut IsolateStack {
            &mut self.isolates
        }
    }

    fn current_name(ctx: &mut Ctx) -> Option<String> {
        ctx.isolates().current().map(|o| o.display_name())
    }

    #[test]
    fn nested_isolates_restore_parent() {
        let mut ctx = Ctx {
            isolates: IsolateStack::new(),
        };
        let root: Arc<dyn IsolateOwner> = Arc::new(OwnerScope::build(":"));
        let included: Arc<dyn IsolateOwner> = Arc::new(OwnerScope::build(":included"));

        ctx.with_isolate(root, |ctx| {
            assert_eq!(current_name(ctx).as_deref(), Some("build ':'"));
            ctx.with_isolate(included, |ctx| {
                assert_eq!(current_name(ctx).as_deref(), Some("build ':included'"));
                assert_eq!(ctx.isolates().depth(), 2);
            });
            assert_eq!(current_name(ctx).as_deref(), Some("build ':'"));
        });
        assert!(current_name(&mut ctx).is_none());
    }

    #[test]
    fn isolate_is_restored_on_error() {
        let mut ctx = Ctx {
            isolates: IsolateStack::new(),
        };
        let owner: Arc<dyn IsolateOwner> = Arc::new(OwnerScope::project(":app"));
        let result: Result<(), &str> = ctx.with_isolate(owner, |_| Err("boom"));
        assert!(result.is_err());
        assert_eq!(ctx.isolates().depth(), 0);
    }

    #[test]
    fn owner_scope_serves_registered_services() {
        let owner = OwnerScope::project(":app").with_service(ServiceRef::new("fileSystem", 7u32));
        assert_eq!(owner.kind(), OwnerKind::Project);
        assert_eq!(owner.path(), ":app");
        let svc = owner.service("fileSystem").unwrap();
        assert_eq!(svc.downcast_ref::<u32>(), Some(&7));
        assert!(owner.service("missing").is_none());
    }
}
