//! The resolution algorithm.
//!
//! A resolve request finds candidate registrations (registry first, then the
//! registration sources in order), picks one, lets its lifetime choose the
//! owning scope and builds or reuses the instance there. Shared instances are
//! cached before their properties are wired; that wiring runs when the
//! outermost request finishes, which is what lets property cycles close.

use crate::core::{
  unerase, BoxError, Cached, Core, Instance, Lifetime, Operation, PendingWire,
};
use crate::error::{ErrorKind, KeyChain, ResolutionError};
use crate::intercept::InterceptorChain;
use crate::key::ServiceKey;
use crate::lazy::Lazy;
use crate::registration::Registration;
use crate::scope::{Scope, ScopeInner};

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// The view of the container handed to factories, decorators, wiring hooks
/// and registration sources.
///
/// It carries the scope resolutions happen in and the path of the request in
/// progress, so constructor cycles are caught and errors report the whole
/// chain of keys.
pub struct ResolutionContext<'a> {
  scope: &'a Arc<ScopeInner>,
  operation: &'a Operation,
  registration: Option<&'a Registration>,
}

impl<'a> ResolutionContext<'a> {
  pub(crate) fn new(scope: &'a Arc<ScopeInner>, operation: &'a Operation) -> Self {
    Self {
      scope,
      operation,
      registration: None,
    }
  }

  fn at<'b>(
    &'b self,
    scope: &'b Arc<ScopeInner>,
    registration: Option<&'b Registration>,
  ) -> ResolutionContext<'b> {
    ResolutionContext {
      scope,
      operation: self.operation,
      registration,
    }
  }

  fn core(&self) -> &Core {
    &self.scope.core
  }

  // --- Public API ---

  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
    self.resolve_key(&ServiceKey::of::<T>())
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(
    &self,
    name: &str,
  ) -> Result<Arc<T>, ResolutionError> {
    self.resolve_key(&ServiceKey::named::<T>(name))
  }

  /// Resolves `key`, which must name type `T`. The key may carry a metadata
  /// filter.
  pub fn resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Arc<T>, ResolutionError> {
    self.check_type::<T>(key)?;
    let instance = self.resolve_instance(key)?;
    self.downcast(key, &instance)
  }

  pub fn try_resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, ResolutionError> {
    self.try_resolve_key(&ServiceKey::of::<T>())
  }

  /// `Ok(None)` when nothing provides `key`. Any other failure is returned.
  pub fn try_resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Option<Arc<T>>, ResolutionError> {
    self.check_type::<T>(key)?;
    let candidates = self.candidates(key)?;
    if candidates.is_empty() {
      return Ok(None);
    }
    let registration = self.select(key, candidates)?;
    let instance = self.resolve_with(&registration, key)?;
    self.downcast(key, &instance).map(Some)
  }

  pub fn resolve_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.resolve_all_key(&ServiceKey::of::<T>())
  }

  /// One instance per matching registration, in registration order.
  pub fn resolve_all_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.check_type::<T>(key)?;
    self
      .candidates(key)?
      .iter()
      .map(|registration| {
        let instance = self.resolve_with(registration, key)?;
        self.downcast(key, &instance)
      })
      .collect()
  }

  /// Resolves one specific registration as service `key`.
  pub fn resolve_registration<T: ?Sized + Any + Send + Sync>(
    &self,
    registration: &Arc<Registration>,
    key: &ServiceKey,
  ) -> Result<Arc<T>, ResolutionError> {
    self.check_type::<T>(key)?;
    let instance = self.resolve_with(registration, key)?;
    self.downcast(key, &instance)
  }

  /// Registrations that would serve `key`: the registry's, or else those of
  /// the first source that provides any.
  pub fn registrations_for(&self, key: &ServiceKey) -> Result<Vec<Arc<Registration>>, ResolutionError> {
    self.candidates(key)
  }

  /// A deferred resolution of `T` from the current scope.
  pub fn lazy<T: ?Sized + Any + Send + Sync>(&self) -> Lazy<T> {
    Lazy::new(self.scope, ServiceKey::of::<T>())
  }

  /// A parameter supplied with `RegistrationBuilder::with_parameter` on the
  /// registration being activated.
  pub fn parameter<P: Any + Send + Sync>(&self, name: &str) -> Option<Arc<P>> {
    self
      .registration?
      .parameters
      .get(name)
      .and_then(|value| unerase::<P>(value))
  }

  /// The scope resolutions from this context happen in.
  pub fn scope(&self) -> Scope {
    Scope::from_inner(self.scope.clone())
  }

  /// Keys currently being resolved, outermost first.
  pub fn path(&self) -> KeyChain {
    KeyChain(self.operation.keys())
  }

  /// A `NotRegistered` error for `key` at the current position.
  pub fn not_registered(&self, key: &ServiceKey) -> ResolutionError {
    self.fail(key, ErrorKind::NotRegistered(key.clone()))
  }

  // --- Algorithm ---

  pub(crate) fn resolve_instance(&self, key: &ServiceKey) -> Result<Instance, ResolutionError> {
    let candidates = self.candidates(key)?;
    let registration = self.select(key, candidates)?;
    self.resolve_with(&registration, key)
  }

  fn candidates(&self, key: &ServiceKey) -> Result<Vec<Arc<Registration>>, ResolutionError> {
    let core = self.core();
    let found = core.registry.lookup(key);
    if !found.is_empty() {
      return Ok(found);
    }

    for source in &core.sources {
      if !source.can_provide(key) {
        continue;
      }
      let provided: Vec<Arc<Registration>> = source
        .provide_all(key, self)?
        .into_iter()
        .filter(|registration| registration.provides(key) && key.matches(&registration.metadata))
        .map(Arc::new)
        .collect();
      if !provided.is_empty() {
        debug!(
          key = %key,
          source = source.name(),
          count = provided.len(),
          "registration source provided candidates"
        );
        return Ok(provided);
      }
    }
    Ok(Vec::new())
  }

  fn select(
    &self,
    key: &ServiceKey,
    mut candidates: Vec<Arc<Registration>>,
  ) -> Result<Arc<Registration>, ResolutionError> {
    if candidates.len() > 1 && self.core().options.strict_cardinality {
      return Err(self.fail(
        key,
        ErrorKind::AmbiguousRegistration {
          key: key.clone(),
          count: candidates.len(),
        },
      ));
    }
    candidates.pop().ok_or_else(|| self.not_registered(key))
  }

  fn resolve_with(
    &self,
    registration: &Arc<Registration>,
    key: &ServiceKey,
  ) -> Result<Instance, ResolutionError> {
    if self.scope.is_disposed() {
      return Err(self.fail(key, ErrorKind::ScopeDisposed(self.scope.id)));
    }
    let max_depth = self.core().options.max_depth;
    if self.operation.depth() >= max_depth {
      return Err(self.fail(key, ErrorKind::DepthExceeded(max_depth)));
    }

    match &registration.lifetime {
      Lifetime::Transient => self.create_transient(registration, key),
      Lifetime::Scoped => {
        let owner = self.scope.scoped_owner(registration.id);
        self.resolve_shared(owner, registration, key)
      }
      Lifetime::Singleton => self.resolve_shared(self.scope.root_scope(), registration, key),
      Lifetime::MatchingScope(tag) => match self.scope.tagged(tag) {
        Some(owner) => self.resolve_shared(owner, registration, key),
        None => Err(self.fail(
          key,
          ErrorKind::NoMatchingScope {
            key: key.identity(),
            tag: tag.clone(),
          },
        )),
      },
    }
  }

  fn create_transient(
    &self,
    registration: &Arc<Registration>,
    key: &ServiceKey,
  ) -> Result<Instance, ResolutionError> {
    self.check_cycle(registration, key)?;
    let _frame = self.operation.enter(key, registration.id);
    let raw = self.activate(self.scope, registration, key)?;
    self.wire(self.scope, registration, key, &raw)?;
    self.present(self.scope, registration, key, &raw)
  }

  fn resolve_shared(
    &self,
    owner: &Arc<ScopeInner>,
    registration: &Arc<Registration>,
    key: &ServiceKey,
  ) -> Result<Instance, ResolutionError> {
    if owner.is_disposed() {
      return Err(self.fail(key, ErrorKind::ScopeDisposed(owner.id)));
    }

    let view = owner.view_cell(registration.id, key);
    if let Some(cached) = view.get() {
      trace!(key = %key, scope = %owner.id, "serving cached instance");
      self.operation.observe(&cached.built_by);
      return Ok(cached.instance.clone());
    }

    let cell = owner.instance_cell(registration.id);
    let mut created = false;
    let raw = match cell.get() {
      Some(raw) => raw.clone(),
      None => {
        self.check_cycle(registration, key)?;
        let _frame = self.operation.enter(key, registration.id);
        cell
          .get_or_try_init(|| {
            let instance = self.activate(owner, registration, key)?;
            created = true;
            Ok::<_, ResolutionError>(Cached {
              instance,
              built_by: self.operation.publication().clone(),
            })
          })?
          .clone()
      }
    };

    if created {
      self.operation.created(owner, registration.id);
      owner.track(registration, &raw);
      if !registration.wiring.is_empty() {
        self.operation.defer(PendingWire {
          scope: owner.clone(),
          registration: registration.clone(),
          instance: raw.instance.clone(),
        });
      }
    } else {
      self.operation.observe(&raw.built_by);
    }

    // A decorator or interceptor asking for the key it is presenting would
    // block on the cell this thread is filling.
    if view.get().is_none() && self.operation.contains_frame(registration.id, key) {
      return Err(self.circular(key));
    }
    let presented = view.get_or_try_init(|| {
      let _frame = self.operation.enter(key, registration.id);
      let instance = self.present(owner, registration, key, &raw.instance)?;
      Ok::<_, ResolutionError>(Cached {
        instance,
        built_by: raw.built_by.clone(),
      })
    });
    match presented {
      Ok(cached) => Ok(cached.instance.clone()),
      Err(err) => {
        if created {
          owner.evict(registration.id, self.operation.publication());
        }
        Err(err)
      }
    }
  }

  fn activate(
    &self,
    scope: &Arc<ScopeInner>,
    registration: &Registration,
    key: &ServiceKey,
  ) -> Result<Instance, ResolutionError> {
    debug!(
      key = %key,
      implementation = registration.implementation,
      lifetime = ?registration.lifetime,
      scope = %scope.id,
      "activating component"
    );
    let ctx = self.at(scope, Some(registration));
    (registration.activator)(&ctx).map_err(|err| self.factory_error(key, err))
  }

  fn wire(
    &self,
    scope: &Arc<ScopeInner>,
    registration: &Registration,
    key: &ServiceKey,
    raw: &Instance,
  ) -> Result<(), ResolutionError> {
    let ctx = self.at(scope, Some(registration));
    for hook in &registration.wiring {
      hook(raw, &ctx).map_err(|err| self.factory_error(key, err))?;
    }
    Ok(())
  }

  /// Projects the raw instance to the requested service, then decorates and
  /// proxies it.
  fn present(
    &self,
    scope: &Arc<ScopeInner>,
    registration: &Registration,
    key: &ServiceKey,
    raw: &Instance,
  ) -> Result<Instance, ResolutionError> {
    let mismatch = || {
      self.fail(
        key,
        ErrorKind::TypeMismatch {
          key: key.identity(),
          expected: registration.implementation,
        },
      )
    };
    let binding = registration.binding_for(key).ok_or_else(mismatch)?;
    let mut instance = (binding.project)(raw).ok_or_else(mismatch)?;

    let ctx = self.at(scope, Some(registration));
    let local = registration
      .decorators
      .iter()
      .filter(|decorator| decorator.applies_to_type(key));
    let shared = self
      .core()
      .decorators
      .iter()
      .filter(|decorator| decorator.applies_to(key));
    for decorator in local.chain(shared) {
      instance = decorator
        .apply(instance, &ctx)
        .map_err(|err| self.factory_error(key, err))?;
    }

    if registration.intercepted {
      if let Some(proxy) = registration.proxies.get(&key.type_id()) {
        let chain = self.interceptor_chain(&ctx, registration)?;
        instance = proxy(instance, chain).ok_or_else(mismatch)?;
      }
    }
    Ok(instance)
  }

  /// Container-level interceptors first, then the registration's own.
  fn interceptor_chain(
    &self,
    ctx: &ResolutionContext<'_>,
    registration: &Registration,
  ) -> Result<InterceptorChain, ResolutionError> {
    let mut interceptors = self.core().interceptors.clone();
    for resolve in &registration.interceptor_services {
      interceptors.push(resolve(ctx)?);
    }
    Ok(InterceptorChain::new(interceptors))
  }

  /// Wires every instance whose properties were deferred during this
  /// operation, including ones created by the wiring itself. On failure the
  /// caller abandons the operation, which evicts everything it built.
  pub(crate) fn complete(&self) -> Result<(), ResolutionError> {
    while let Some(pending) = self.operation.next_pending() {
      let key = pending.registration.primary_key().clone();
      let _frame = self.operation.enter(&key, pending.registration.id);
      self.wire(&pending.scope, &pending.registration, &key, &pending.instance)?;
    }
    Ok(())
  }

  // --- Errors ---

  fn check_type<T: ?Sized + Any>(&self, key: &ServiceKey) -> Result<(), ResolutionError> {
    if key.is_type::<T>() {
      Ok(())
    } else {
      Err(self.fail(
        key,
        ErrorKind::TypeMismatch {
          key: key.identity(),
          expected: type_name::<T>(),
        },
      ))
    }
  }

  fn downcast<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
    instance: &Instance,
  ) -> Result<Arc<T>, ResolutionError> {
    unerase::<T>(instance).ok_or_else(|| {
      self.fail(
        key,
        ErrorKind::TypeMismatch {
          key: key.identity(),
          expected: type_name::<T>(),
        },
      )
    })
  }

  fn check_cycle(&self, registration: &Registration, key: &ServiceKey) -> Result<(), ResolutionError> {
    if self.operation.contains_registration(registration.id) {
      Err(self.circular(key))
    } else {
      Ok(())
    }
  }

  fn circular(&self, key: &ServiceKey) -> ResolutionError {
    let mut keys = self.operation.keys();
    keys.push(key.identity());
    ResolutionError::new(ErrorKind::CircularDependency(KeyChain(keys.clone())), KeyChain(keys))
  }

  /// An error at `key`, with the current path as its chain.
  fn fail(&self, key: &ServiceKey, kind: ErrorKind) -> ResolutionError {
    let mut keys = self.operation.keys();
    if keys.last() != Some(key) {
      keys.push(key.clone());
    }
    ResolutionError::new(kind, KeyChain(keys))
  }

  /// Wraps a failure from user code. A `ResolutionError` raised by a nested
  /// resolve passes through unchanged.
  fn factory_error(&self, key: &ServiceKey, err: BoxError) -> ResolutionError {
    match err.downcast::<ResolutionError>() {
      Ok(inner) => *inner,
      Err(source) => self.fail(
        key,
        ErrorKind::Factory {
          key: key.identity(),
          source,
        },
      ),
    }
  }
}

impl fmt::Debug for ResolutionContext<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResolutionContext")
      .field("scope", &self.scope.id)
      .field("path", &self.path())
      .field(
        "registration",
        &self.registration.map(|registration| registration.implementation),
      )
      .finish()
  }
}
