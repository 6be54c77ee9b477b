//! Registrations and the fluent builder used to configure them.

use crate::component::{Component, Dispose, PropertyInjection};
use crate::core::{
  erase, unerase, Activator, BoxError, Instance, InterceptorRef, Lifetime, Ownership, Projection,
  ProxyFn, RegistrationId, ReleaseFn, WireFn,
};
use crate::decorator::DecoratorEntry;
use crate::intercept::{Interceptor, InterceptorChain};
use crate::key::{MetaValue, Metadata, ServiceKey};
use crate::resolver::ResolutionContext;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A service exposed by a registration, with the projection from the
/// implementation instance to that service.
#[derive(Clone)]
pub(crate) struct ServiceBinding {
  pub(crate) key: ServiceKey,
  pub(crate) project: Projection,
}

impl ServiceBinding {
  fn identity<C: ?Sized + Any + Send + Sync>(key: ServiceKey) -> Self {
    Self {
      key,
      project: Arc::new(|raw| unerase::<C>(raw).map(erase)),
    }
  }
}

/// Describes how to produce instances of one implementation.
///
/// A clone keeps the same [`RegistrationId`], so scopes treat it as the same
/// registration when caching shared instances.
#[derive(Clone)]
pub struct Registration {
  pub(crate) id: RegistrationId,
  pub(crate) implementation: &'static str,
  pub(crate) activator: Activator,
  pub(crate) self_binding: ServiceBinding,
  pub(crate) services: Vec<ServiceBinding>,
  pub(crate) lifetime: Lifetime,
  pub(crate) ownership: Ownership,
  pub(crate) metadata: Metadata,
  pub(crate) parameters: HashMap<String, Instance>,
  pub(crate) wiring: Vec<WireFn>,
  pub(crate) releases: Vec<ReleaseFn>,
  pub(crate) intercepted: bool,
  pub(crate) proxies: HashMap<TypeId, ProxyFn>,
  pub(crate) interceptor_services: Vec<InterceptorRef>,
  pub(crate) decorators: Vec<DecoratorEntry>,
}

impl Registration {
  fn with_activator<C: ?Sized + Any + Send + Sync>(activator: Activator) -> Self {
    Self {
      id: RegistrationId::next(),
      implementation: std::any::type_name::<C>(),
      activator,
      self_binding: ServiceBinding::identity::<C>(ServiceKey::of::<C>()),
      services: Vec::new(),
      lifetime: Lifetime::default(),
      ownership: Ownership::default(),
      metadata: Metadata::new(),
      parameters: HashMap::new(),
      wiring: Vec::new(),
      releases: Vec::new(),
      intercepted: false,
      proxies: HashMap::new(),
      interceptor_services: Vec::new(),
      decorators: Vec::new(),
    }
  }

  /// A registration constructing `C` through its [`Component`] impl.
  pub fn of_type<C: Component>() -> RegistrationBuilder<'static, C> {
    let activator: Activator = Arc::new(|ctx| C::construct(ctx).map(|c| erase(Arc::new(c))));
    RegistrationBuilder::owned(Self::with_activator::<C>(activator))
  }

  /// A registration constructing `C` with a factory closure.
  pub fn factory<C, F>(factory: F) -> RegistrationBuilder<'static, C>
  where
    C: Any + Send + Sync,
    F: Fn(&ResolutionContext<'_>) -> Result<C, BoxError> + Send + Sync + 'static,
  {
    let activator: Activator = Arc::new(move |ctx| factory(ctx).map(|c| erase(Arc::new(c))));
    RegistrationBuilder::owned(Self::with_activator::<C>(activator))
  }

  /// A registration whose factory returns an `Arc`, typically a trait object.
  pub fn arc_factory<C, F>(factory: F) -> RegistrationBuilder<'static, C>
  where
    C: ?Sized + Any + Send + Sync,
    F: Fn(&ResolutionContext<'_>) -> Result<Arc<C>, BoxError> + Send + Sync + 'static,
  {
    let activator: Activator = Arc::new(move |ctx| factory(ctx).map(erase));
    RegistrationBuilder::owned(Self::with_activator::<C>(activator))
  }

  /// A pre-built instance. Singleton, and never released by the container.
  pub fn instance<C: Any + Send + Sync>(value: C) -> RegistrationBuilder<'static, C> {
    Self::arc_instance(Arc::new(value))
  }

  pub fn arc_instance<C: ?Sized + Any + Send + Sync>(value: Arc<C>) -> RegistrationBuilder<'static, C> {
    let instance = erase(value);
    let activator: Activator = Arc::new(move |_| Ok(instance.clone()));
    let mut registration = Self::with_activator::<C>(activator);
    registration.lifetime = Lifetime::Singleton;
    registration.ownership = Ownership::OwnedBySystem;
    RegistrationBuilder::owned(registration)
  }

  pub fn id(&self) -> RegistrationId {
    self.id
  }

  /// The type name of the implementation.
  pub fn implementation(&self) -> &'static str {
    self.implementation
  }

  /// Keys of every service this registration exposes.
  pub fn services(&self) -> Vec<ServiceKey> {
    self.bindings().iter().map(|b| b.key.clone()).collect()
  }

  pub fn lifetime(&self) -> &Lifetime {
    &self.lifetime
  }

  pub fn ownership(&self) -> Ownership {
    self.ownership
  }

  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  pub fn is_intercepted(&self) -> bool {
    self.intercepted
  }

  /// Returns `true` if the registration exposes `key`, ignoring its filter.
  pub fn provides(&self, key: &ServiceKey) -> bool {
    self.binding_for(key).is_some()
  }

  pub(crate) fn bindings(&self) -> &[ServiceBinding] {
    if self.services.is_empty() {
      std::slice::from_ref(&self.self_binding)
    } else {
      &self.services
    }
  }

  /// The first exposed service, used to label wiring failures.
  pub(crate) fn primary_key(&self) -> &ServiceKey {
    self.services.first().map_or(&self.self_binding.key, |b| &b.key)
  }

  pub(crate) fn binding_for(&self, key: &ServiceKey) -> Option<&ServiceBinding> {
    self.bindings().iter().find(|b| b.key == *key)
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("id", &self.id)
      .field("implementation", &self.implementation)
      .field("services", &self.services())
      .field("lifetime", &self.lifetime)
      .field("ownership", &self.ownership)
      .field("metadata", &self.metadata)
      .field("intercepted", &self.intercepted)
      .finish()
  }
}

enum Slot<'a> {
  Owned(Registration),
  Attached(&'a mut Registration),
}

/// Fluent configuration of a [`Registration`] for implementation `C`.
///
/// Builders returned by `ContainerBuilder::register_*` edit the registration
/// in place. Builders from `Registration::*` own theirs; call
/// [`build`](Self::build) to take it.
pub struct RegistrationBuilder<'a, C: ?Sized> {
  slot: Slot<'a>,
  _marker: PhantomData<fn() -> Arc<C>>,
}

impl<'a, C: ?Sized + Any + Send + Sync> RegistrationBuilder<'a, C> {
  fn owned(registration: Registration) -> Self {
    Self {
      slot: Slot::Owned(registration),
      _marker: PhantomData,
    }
  }

  pub(crate) fn attached(registration: &'a mut Registration) -> Self {
    Self {
      slot: Slot::Attached(registration),
      _marker: PhantomData,
    }
  }

  fn registration(&mut self) -> &mut Registration {
    match &mut self.slot {
      Slot::Owned(registration) => registration,
      Slot::Attached(registration) => &mut **registration,
    }
  }

  fn push_service(&mut self, binding: ServiceBinding) {
    let registration = self.registration();
    registration.services.retain(|existing| existing.key != binding.key);
    registration.services.push(binding);
  }

  /// Exposes the component as service `I` using `upcast`, usually `|c| c`
  /// coerced to a trait object.
  pub fn as_service<I>(self, upcast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    self.bind::<I>(ServiceKey::of::<I>(), upcast)
  }

  pub fn as_named_service<I>(
    self,
    name: &str,
    upcast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
  ) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    self.bind::<I>(ServiceKey::named::<I>(name), upcast)
  }

  fn bind<I>(mut self, key: ServiceKey, upcast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    let project: Projection = Arc::new(move |raw| unerase::<C>(raw).map(|c| erase(upcast(c))));
    self.push_service(ServiceBinding { key, project });
    self
  }

  /// Keeps the implementation type itself as a service next to the others.
  pub fn as_self(mut self) -> Self {
    self.push_service(ServiceBinding::identity::<C>(ServiceKey::of::<C>()));
    self
  }

  /// Exposes the implementation type under `name`.
  pub fn named(mut self, name: &str) -> Self {
    self.push_service(ServiceBinding::identity::<C>(ServiceKey::named::<C>(name)));
    self
  }

  pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
    self.registration().lifetime = lifetime;
    self
  }

  pub fn transient(self) -> Self {
    self.lifetime(Lifetime::Transient)
  }

  pub fn scoped(self) -> Self {
    self.lifetime(Lifetime::Scoped)
  }

  pub fn singleton(self) -> Self {
    self.lifetime(Lifetime::Singleton)
  }

  pub fn per_matching_scope(self, tag: &str) -> Self {
    self.lifetime(Lifetime::MatchingScope(tag.to_owned()))
  }

  pub fn owned_by_scope(mut self) -> Self {
    self.registration().ownership = Ownership::OwnedByScope;
    self
  }

  pub fn externally_owned(mut self) -> Self {
    self.registration().ownership = Ownership::OwnedBySystem;
    self
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
    self.registration().metadata.insert(key.into(), value.into());
    self
  }

  /// A named value the activator can read with `ResolutionContext::parameter`.
  pub fn with_parameter<P: Any + Send + Sync>(mut self, name: &str, value: P) -> Self {
    self
      .registration()
      .parameters
      .insert(name.to_owned(), erase(Arc::new(value)));
    self
  }

  /// Runs `release` when the owning scope is disposed.
  pub fn on_release(mut self, release: impl Fn(&C) + Send + Sync + 'static) -> Self {
    let release: ReleaseFn = Arc::new(move |instance| {
      if let Some(component) = unerase::<C>(instance) {
        release(&*component);
      }
    });
    self.registration().releases.push(release);
    self
  }

  /// Wires dependencies after the instance is cache-visible.
  pub fn wire_properties<F>(mut self, wire: F) -> Self
  where
    F: Fn(&C, &ResolutionContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let implementation = self.registration().implementation;
    let wire: WireFn = Arc::new(move |instance, ctx| {
      let component = unerase::<C>(instance)
        .ok_or_else(|| BoxError::from(format!("instance is not a {}", implementation)))?;
      wire(&*component, ctx)
    });
    self.registration().wiring.push(wire);
    self
  }

  /// Marks the component intercepted and supplies the forwarding proxy for
  /// service `I`.
  pub fn enable_interception<I>(
    mut self,
    proxy: impl Fn(Arc<I>, InterceptorChain) -> Arc<I> + Send + Sync + 'static,
  ) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    let proxy: ProxyFn = Arc::new(move |instance, chain| {
      unerase::<I>(&instance).map(|target| erase(proxy(target, chain)))
    });
    let registration = self.registration();
    registration.intercepted = true;
    registration.proxies.insert(TypeId::of::<I>(), proxy);
    self
  }

  /// Adds interceptor `X`, resolved from the container when the proxy is built.
  pub fn intercepted_by<X: Interceptor>(mut self) -> Self {
    let resolve: InterceptorRef = Arc::new(|ctx| ctx.resolve::<X>().map(|x| x as Arc<dyn Interceptor>));
    let registration = self.registration();
    registration.intercepted = true;
    registration.interceptor_services.push(resolve);
    self
  }

  /// A decorator applied only to this registration's `I` service, before any
  /// container-level decorator.
  pub fn decorate<I, F>(mut self, wrap: F) -> Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    self.registration().decorators.push(DecoratorEntry::for_service::<I, F>(wrap));
    self
  }

  /// Takes the configured registration. Attached builders hand out a clone.
  pub fn build(self) -> Registration {
    match self.slot {
      Slot::Owned(registration) => registration,
      Slot::Attached(registration) => registration.clone(),
    }
  }
}

impl<'a, C: Any + Send + Sync + Dispose> RegistrationBuilder<'a, C> {
  /// Runs [`Dispose::dispose`] when the owning scope is disposed.
  pub fn disposable(self) -> Self {
    self.on_release(<C as Dispose>::dispose)
  }
}

impl<'a, C: Any + Send + Sync + PropertyInjection> RegistrationBuilder<'a, C> {
  /// Wires properties through [`PropertyInjection`].
  pub fn properties_autowired(self) -> Self {
    self.wire_properties(<C as PropertyInjection>::inject_properties)
  }
}
