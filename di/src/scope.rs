//! Lifetime scopes: a tree of caches that own shared instances and release
//! them on disposal.

use crate::core::{Cached, Core, Instance, Operation, Ownership, Publication, RegistrationId, ReleaseFn};
use crate::error::{Error, ResolutionError, Result};
use crate::key::ServiceKey;
use crate::lazy::Lazy;
use crate::registration::Registration;
use crate::resolver::ResolutionContext;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(0);

/// Identity of a scope, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
  fn next() -> Self {
    Self(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for ScopeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// An instance whose release hooks run when its scope is disposed.
struct Owned {
  registration: RegistrationId,
  implementation: &'static str,
  instance: Instance,
  built_by: Arc<Publication>,
  releases: Vec<ReleaseFn>,
}

impl Owned {
  fn release(self) {
    trace!(implementation = self.implementation, "releasing instance");
    for release in &self.releases {
      release(&self.instance);
    }
  }
}

type Cell = Arc<OnceCell<Cached>>;

pub(crate) struct ScopeInner {
  pub(crate) id: ScopeId,
  tag: Option<String>,
  parent: Option<Arc<ScopeInner>>,
  pub(crate) core: Arc<Core>,
  // Raw implementation instances, one per shared registration.
  instances: DashMap<RegistrationId, Cell>,
  // Projected, decorated and proxied instances per requested service.
  views: DashMap<(RegistrationId, ServiceKey), Cell>,
  owned: Mutex<Vec<Owned>>,
  children: Mutex<Vec<Weak<ScopeInner>>>,
  disposed: AtomicBool,
}

impl ScopeInner {
  pub(crate) fn root(core: Arc<Core>) -> Arc<Self> {
    Arc::new(Self::new(core, None, None))
  }

  fn new(core: Arc<Core>, parent: Option<Arc<ScopeInner>>, tag: Option<String>) -> Self {
    Self {
      id: ScopeId::next(),
      tag,
      parent,
      core,
      instances: DashMap::new(),
      views: DashMap::new(),
      owned: Mutex::new(Vec::new()),
      children: Mutex::new(Vec::new()),
      disposed: AtomicBool::new(false),
    }
  }

  fn child(self: &Arc<Self>, tag: Option<&str>) -> Arc<Self> {
    let child = Arc::new(Self::new(
      self.core.clone(),
      Some(self.clone()),
      tag.map(str::to_owned),
    ));
    let mut children = self.children.lock();
    children.retain(|weak| weak.strong_count() > 0);
    children.push(Arc::downgrade(&child));
    debug!(parent = %self.id, scope = %child.id, tag = ?child.tag, "created child scope");
    child
  }

  pub(crate) fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  pub(crate) fn instance_cell(&self, id: RegistrationId) -> Cell {
    self
      .instances
      .entry(id)
      .or_insert_with(|| Arc::new(OnceCell::new()))
      .clone()
  }

  pub(crate) fn view_cell(&self, id: RegistrationId, key: &ServiceKey) -> Cell {
    self
      .views
      .entry((id, key.identity()))
      .or_insert_with(|| Arc::new(OnceCell::new()))
      .clone()
  }

  fn holds(&self, id: RegistrationId) -> bool {
    self
      .instances
      .get(&id)
      .map_or(false, |cell| cell.get().is_some())
  }

  /// The nearest scope, starting here and walking up, that already holds an
  /// instance of `id`; this scope when none does.
  pub(crate) fn scoped_owner(self: &Arc<Self>, id: RegistrationId) -> &Arc<Self> {
    let mut scope = self;
    loop {
      if scope.holds(id) {
        return scope;
      }
      match &scope.parent {
        Some(parent) => scope = parent,
        None => return self,
      }
    }
  }

  pub(crate) fn root_scope(self: &Arc<Self>) -> &Arc<Self> {
    let mut scope = self;
    while let Some(parent) = &scope.parent {
      scope = parent;
    }
    scope
  }

  pub(crate) fn tagged(self: &Arc<Self>, tag: &str) -> Option<&Arc<Self>> {
    let mut scope = Some(self);
    while let Some(current) = scope {
      if current.tag.as_deref() == Some(tag) {
        return Some(current);
      }
      scope = current.parent.as_ref();
    }
    None
  }

  /// Records a freshly built shared instance for release on disposal.
  pub(crate) fn track(&self, registration: &Registration, cached: &Cached) {
    if registration.ownership != Ownership::OwnedByScope || registration.releases.is_empty() {
      return;
    }
    self.owned.lock().push(Owned {
      registration: registration.id,
      implementation: registration.implementation,
      instance: cached.instance.clone(),
      built_by: cached.built_by.clone(),
      releases: registration.releases.clone(),
    });
  }

  /// Forgets the instance of `id` built by `built_by`, with every view of
  /// it, and releases it if it was tracked. Instances another operation
  /// built in the meantime stay cached.
  pub(crate) fn evict(&self, id: RegistrationId, built_by: &Arc<Publication>) {
    let built_here =
      |cell: &Cell| cell.get().map_or(false, |cached| Arc::ptr_eq(&cached.built_by, built_by));
    self.instances.remove_if(&id, |_, cell| built_here(cell));
    self
      .views
      .retain(|(registration, _), cell| *registration != id || !built_here(&*cell));
    let evicted: Vec<Owned> = {
      let mut owned = self.owned.lock();
      let (evicted, kept): (Vec<Owned>, Vec<Owned>) = std::mem::take(&mut *owned)
        .into_iter()
        .partition(|o| o.registration == id && Arc::ptr_eq(&o.built_by, built_by));
      *owned = kept;
      evicted
    };
    if !evicted.is_empty() {
      debug!(scope = %self.id, registration = %id, "evicting instance after failed resolution");
    }
    for entry in evicted {
      entry.release();
    }
  }

  fn live_children(&self) -> Vec<Arc<ScopeInner>> {
    self
      .children
      .lock()
      .iter()
      .filter_map(Weak::upgrade)
      .filter(|child| !child.is_disposed())
      .collect()
  }

  pub(crate) fn dispose(&self, cascade: bool) -> Result<()> {
    if self.is_disposed() {
      return Ok(());
    }

    let live = self.live_children();
    if !live.is_empty() {
      if !cascade {
        return Err(Error::ScopeNotEmpty {
          scope: self.id,
          live_children: live.len(),
        });
      }
      for child in live.iter().rev() {
        child.dispose(true)?;
      }
    }

    if self.disposed.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    debug!(scope = %self.id, tag = ?self.tag, "disposing scope");
    self.release_owned();
    Ok(())
  }

  fn release_owned(&self) {
    let owned = std::mem::take(&mut *self.owned.lock());
    for entry in owned.into_iter().rev() {
      entry.release();
    }
    self.views.clear();
    self.instances.clear();
  }
}

impl Drop for ScopeInner {
  fn drop(&mut self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      debug!(scope = %self.id, "disposing dropped scope");
      self.release_owned();
    }
  }
}

/// A handle to a lifetime scope.
///
/// Handles are cheap to clone. When the last handle of a scope that was
/// never disposed goes away, the scope disposes itself.
#[derive(Clone)]
pub struct Scope {
  pub(crate) inner: Arc<ScopeInner>,
}

impl Scope {
  pub(crate) fn from_inner(inner: Arc<ScopeInner>) -> Self {
    Self { inner }
  }

  pub fn id(&self) -> ScopeId {
    self.inner.id
  }

  pub fn tag(&self) -> Option<&str> {
    self.inner.tag.as_deref()
  }

  pub fn is_disposed(&self) -> bool {
    self.inner.is_disposed()
  }

  pub fn parent(&self) -> Option<Scope> {
    self.inner.parent.clone().map(Scope::from_inner)
  }

  /// Returns `true` if both handles point at the same scope.
  pub fn same_scope(&self, other: &Scope) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub fn create_child(&self) -> Scope {
    Scope::from_inner(self.inner.child(None))
  }

  /// Creates a child scope that serves `Lifetime::MatchingScope(tag)`
  /// registrations for its subtree.
  pub fn create_tagged_child(&self, tag: &str) -> Scope {
    Scope::from_inner(self.inner.child(Some(tag)))
  }

  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
    self.run(|ctx| ctx.resolve::<T>())
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(
    &self,
    name: &str,
  ) -> Result<Arc<T>, ResolutionError> {
    self.run(|ctx| ctx.resolve_named::<T>(name))
  }

  pub fn resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Arc<T>, ResolutionError> {
    self.run(|ctx| ctx.resolve_key::<T>(key))
  }

  /// Like [`resolve`](Self::resolve), but `Ok(None)` when nothing provides `T`.
  pub fn try_resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, ResolutionError> {
    self.run(|ctx| ctx.try_resolve::<T>())
  }

  pub fn try_resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Option<Arc<T>>, ResolutionError> {
    self.run(|ctx| ctx.try_resolve_key::<T>(key))
  }

  /// Every registration of `T`, oldest first.
  pub fn resolve_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.run(|ctx| ctx.resolve_all::<T>())
  }

  pub fn resolve_all_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.run(|ctx| ctx.resolve_all_key::<T>(key))
  }

  /// A handle that resolves `T` from this scope on first use.
  pub fn lazy<T: ?Sized + Any + Send + Sync>(&self) -> Lazy<T> {
    Lazy::new(&self.inner, ServiceKey::of::<T>())
  }

  /// Releases the scope's owned instances in reverse construction order.
  ///
  /// Fails with [`Error::ScopeNotEmpty`] while child scopes are alive.
  /// Disposing twice is a no-op.
  pub fn dispose(&self) -> Result<()> {
    self.inner.dispose(false)
  }

  /// Disposes live children depth-first, then this scope.
  pub fn dispose_cascade(&self) -> Result<()> {
    self.inner.dispose(true)
  }

  /// Runs one outermost resolve operation, finishing deferred property
  /// wiring before returning.
  ///
  /// A failed operation evicts every shared instance it built. If a shared
  /// instance it picked up from a concurrent operation was evicted that way,
  /// the whole resolve runs again.
  pub(crate) fn run<R>(
    &self,
    resolve: impl Fn(&ResolutionContext<'_>) -> Result<R, ResolutionError>,
  ) -> Result<R, ResolutionError> {
    loop {
      let operation = Operation::new();
      let ctx = ResolutionContext::new(&self.inner, &operation);
      match resolve(&ctx).and_then(|value| ctx.complete().map(|()| value)) {
        Ok(value) => {
          if operation.publish() {
            return Ok(value);
          }
          debug!(scope = %self.inner.id, "concurrent resolution discarded its instances, resolving again");
        }
        Err(err) => {
          operation.abandon();
          return Err(err);
        }
      }
    }
  }
}

impl fmt::Debug for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("id", &self.inner.id)
      .field("tag", &self.inner.tag)
      .field("disposed", &self.is_disposed())
      .finish()
  }
}
