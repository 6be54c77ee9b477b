//! Core, non-public data structures shared by the resolver and the scopes.

use crate::config::ContainerOptions;
use crate::decorator::DecoratorEntry;
use crate::intercept::Interceptor;
use crate::key::ServiceKey;
use crate::registration::Registration;
use crate::registry::Registry;
use crate::resolver::ResolutionContext;
use crate::scope::ScopeInner;
use crate::source::RegistrationSource;

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A boxed error returned by user code (factories, decorators, wiring).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A type-erased instance. The payload is always an `Arc<T>` for the type
/// the instance was produced as.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Activator =
  Arc<dyn Fn(&ResolutionContext<'_>) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type Projection = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
pub(crate) type ProxyFn =
  Arc<dyn Fn(Instance, crate::intercept::InterceptorChain) -> Option<Instance> + Send + Sync>;
pub(crate) type WireFn =
  Arc<dyn Fn(&Instance, &ResolutionContext<'_>) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type ReleaseFn = Arc<dyn Fn(&Instance) + Send + Sync>;
pub(crate) type DecorateFn =
  Arc<dyn Fn(Instance, &ResolutionContext<'_>) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type InterceptorRef = Arc<
  dyn Fn(&ResolutionContext<'_>) -> Result<Arc<dyn Interceptor>, crate::ResolutionError>
    + Send
    + Sync,
>;

pub(crate) fn erase<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Instance {
  Arc::new(value)
}

pub(crate) fn unerase<T: ?Sized + Any + Send + Sync>(instance: &Instance) -> Option<Arc<T>> {
  instance.downcast_ref::<Arc<T>>().cloned()
}

/// How instances of a registration are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
  /// A new instance for every resolution. Never tracked by a scope.
  #[default]
  Transient,
  /// One instance per scope, visible to the scope's descendants.
  Scoped,
  /// One instance for the whole container, owned by the root scope.
  Singleton,
  /// One instance per nearest enclosing scope carrying the tag.
  MatchingScope(String),
}

impl Lifetime {
  pub fn is_shared(&self) -> bool {
    !matches!(self, Lifetime::Transient)
  }
}

/// Who releases a shared instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
  /// The owning scope runs the release hooks when it is disposed.
  #[default]
  OwnedByScope,
  /// The container never releases the instance.
  OwnedBySystem,
}

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Identity of a registration. Clones of a registration share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
  pub(crate) fn next() -> Self {
    Self(NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for RegistrationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "r{}", self.0)
  }
}

/// Immutable state shared by every scope of a container.
pub(crate) struct Core {
  pub(crate) registry: Registry,
  pub(crate) sources: Vec<Arc<dyn RegistrationSource>>,
  pub(crate) decorators: Vec<DecoratorEntry>,
  pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
  pub(crate) options: ContainerOptions,
}

/// One step of the in-progress resolution path.
#[derive(Clone)]
pub(crate) struct Frame {
  pub(crate) key: ServiceKey,
  pub(crate) registration: RegistrationId,
}

/// An instance that became cache-visible before its properties were wired.
pub(crate) struct PendingWire {
  pub(crate) scope: Arc<ScopeInner>,
  pub(crate) registration: Arc<Registration>,
  pub(crate) instance: Instance,
}

/// A shared instance in a scope cache, with the operation that built it.
#[derive(Clone)]
pub(crate) struct Cached {
  pub(crate) instance: Instance,
  pub(crate) built_by: Arc<Publication>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
  Building,
  Ready,
  Discarded,
}

/// Whether the shared instances built by one operation may be handed out.
///
/// They are cached as soon as they are constructed, but their graph is only
/// complete once the building operation has wired every deferred property.
/// Other operations that pick one of them up wait here before returning.
pub(crate) struct Publication {
  state: Mutex<Readiness>,
  settled: Condvar,
}

impl Publication {
  fn new() -> Self {
    Self {
      state: Mutex::new(Readiness::Building),
      settled: Condvar::new(),
    }
  }

  fn settle(&self, readiness: Readiness) {
    let mut state = self.state.lock();
    if *state == Readiness::Building {
      *state = readiness;
      self.settled.notify_all();
    }
  }

  fn is_building(&self) -> bool {
    *self.state.lock() == Readiness::Building
  }

  /// Blocks until the building operation has finished. `false` when it failed
  /// and its instances were evicted.
  fn wait(&self) -> bool {
    let mut state = self.state.lock();
    while *state == Readiness::Building {
      self.settled.wait(&mut state);
    }
    *state == Readiness::Ready
  }
}

thread_local! {
  // Operations running on this thread. A factory that resolves through a
  // scope handle starts a nested one.
  static ACTIVE_OPERATIONS: Cell<usize> = const { Cell::new(0) };
}

/// State of one outermost resolve call.
///
/// The path replaces a thread-local stack: nested resolutions started from a
/// factory see it through their `ResolutionContext`.
pub(crate) struct Operation {
  path: RefCell<Vec<Frame>>,
  pending: RefCell<VecDeque<PendingWire>>,
  publication: Arc<Publication>,
  created: RefCell<Vec<(Arc<ScopeInner>, RegistrationId)>>,
  observed: RefCell<Vec<Arc<Publication>>>,
  nested: bool,
}

impl Operation {
  pub(crate) fn new() -> Self {
    let nested = ACTIVE_OPERATIONS.with(|active| {
      let running = active.get();
      active.set(running + 1);
      running > 0
    });
    Self {
      path: RefCell::new(Vec::new()),
      pending: RefCell::new(VecDeque::new()),
      publication: Arc::new(Publication::new()),
      created: RefCell::new(Vec::new()),
      observed: RefCell::new(Vec::new()),
      nested,
    }
  }

  pub(crate) fn depth(&self) -> usize {
    self.path.borrow().len()
  }

  pub(crate) fn keys(&self) -> Vec<ServiceKey> {
    self.path.borrow().iter().map(|frame| frame.key.clone()).collect()
  }

  pub(crate) fn contains_registration(&self, id: RegistrationId) -> bool {
    self.path.borrow().iter().any(|frame| frame.registration == id)
  }

  pub(crate) fn contains_frame(&self, id: RegistrationId, key: &ServiceKey) -> bool {
    self
      .path
      .borrow()
      .iter()
      .any(|frame| frame.registration == id && frame.key == *key)
  }

  pub(crate) fn enter(&self, key: &ServiceKey, registration: RegistrationId) -> PathGuard<'_> {
    self.path.borrow_mut().push(Frame {
      key: key.identity(),
      registration,
    });
    PathGuard { path: &self.path }
  }

  pub(crate) fn publication(&self) -> &Arc<Publication> {
    &self.publication
  }

  /// Records a shared instance this operation put into `scope`.
  pub(crate) fn created(&self, scope: &Arc<ScopeInner>, id: RegistrationId) {
    self.created.borrow_mut().push((scope.clone(), id));
  }

  /// Notes a cached instance some other operation may still be wiring.
  pub(crate) fn observe(&self, built_by: &Arc<Publication>) {
    if Arc::ptr_eq(built_by, &self.publication) || !built_by.is_building() {
      return;
    }
    let mut observed = self.observed.borrow_mut();
    if !observed.iter().any(|seen| Arc::ptr_eq(seen, built_by)) {
      observed.push(built_by.clone());
    }
  }

  pub(crate) fn defer(&self, pending: PendingWire) {
    self.pending.borrow_mut().push_back(pending);
  }

  pub(crate) fn next_pending(&self) -> Option<PendingWire> {
    self.pending.borrow_mut().pop_front()
  }

  /// Marks this operation's instances ready, then waits for every other
  /// operation whose instances it picked up. `false` when one of those was
  /// discarded and the caller has to resolve again.
  ///
  /// A nested operation never waits: its thread may be the one building.
  pub(crate) fn publish(&self) -> bool {
    self.publication.settle(Readiness::Ready);
    if self.nested {
      return true;
    }
    let observed = std::mem::take(&mut *self.observed.borrow_mut());
    observed.iter().all(|publication| publication.wait())
  }

  /// Evicts every shared instance this operation built, wired or not.
  pub(crate) fn abandon(&self) {
    self.pending.borrow_mut().clear();
    let created = std::mem::take(&mut *self.created.borrow_mut());
    for (scope, id) in created.into_iter().rev() {
      scope.evict(id, &self.publication);
    }
    self.publication.settle(Readiness::Discarded);
  }
}

impl Drop for Operation {
  fn drop(&mut self) {
    // Unwinding out of user code must not leave waiters blocked.
    self.publication.settle(Readiness::Discarded);
    ACTIVE_OPERATIONS.with(|active| active.set(active.get().saturating_sub(1)));
  }
}

/// Pops its frame from the resolution path when dropped.
pub(crate) struct PathGuard<'a> {
  path: &'a RefCell<Vec<Frame>>,
}

impl Drop for PathGuard<'_> {
  fn drop(&mut self) {
    self.path.borrow_mut().pop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Shape: Send + Sync {
    fn sides(&self) -> u32;
  }

  struct Square;
  impl Shape for Square {
    fn sides(&self) -> u32 {
      4
    }
  }

  #[test]
  fn erased_instances_round_trip_through_trait_objects() {
    let shape: Arc<dyn Shape> = Arc::new(Square);
    let instance = erase(shape.clone());

    let back = unerase::<dyn Shape>(&instance).map(|s| s.sides());
    assert_eq!(back, Some(4));
    assert!(unerase::<Square>(&instance).is_none());
  }

  #[test]
  fn path_guard_pops_on_drop() {
    let operation = Operation::new();
    let id = RegistrationId::next();
    {
      let _outer = operation.enter(&ServiceKey::of::<u8>(), id);
      let _inner = operation.enter(&ServiceKey::of::<u16>(), RegistrationId::next());
      assert_eq!(operation.depth(), 2);
      assert!(operation.contains_registration(id));
      assert!(operation.contains_frame(id, &ServiceKey::of::<u8>()));
      assert!(!operation.contains_frame(id, &ServiceKey::of::<u16>()));
    }
    assert_eq!(operation.depth(), 0);
    assert!(!operation.contains_registration(id));
  }

  #[test]
  fn operations_started_inside_operations_are_nested() {
    let outer = Operation::new();
    assert!(!outer.nested);
    {
      let inner = Operation::new();
      assert!(inner.nested);
    }
    drop(outer);
    assert!(!Operation::new().nested);
  }

  #[test]
  fn observers_wait_for_the_building_operation() {
    let building = Operation::new();
    let built_by = building.publication().clone();
    let observed = std::sync::Barrier::new(2);

    std::thread::scope(|s| {
      let observer = s.spawn(|| {
        let operation = Operation::new();
        operation.observe(&built_by);
        observed.wait();
        operation.publish()
      });

      observed.wait();
      building.abandon();
      assert!(!observer.join().unwrap());
    });
  }
}
