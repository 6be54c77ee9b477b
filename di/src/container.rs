//! The `ContainerBuilder` and the finalized `Container`.

use crate::component::Component;
use crate::config::ContainerOptions;
use crate::core::{BoxError, Core};
use crate::decorator::DecoratorEntry;
use crate::error::{ResolutionError, Result};
use crate::intercept::Interceptor;
use crate::key::ServiceKey;
use crate::lazy::Lazy;
use crate::registration::{Registration, RegistrationBuilder};
use crate::registry::Registry;
use crate::resolver::ResolutionContext;
use crate::scope::{Scope, ScopeInner};
use crate::source::{AdapterSource, RegistrationSource};

use std::any::Any;
use std::sync::Arc;
use tracing::info;

/// Collects registrations, sources, decorators and interceptors, then
/// finalizes them into an immutable [`Container`].
///
/// Registration is single-threaded by construction: the builder is owned and
/// consumed by [`build`](Self::build).
#[derive(Default)]
pub struct ContainerBuilder {
  options: ContainerOptions,
  registrations: Vec<Registration>,
  sources: Vec<Arc<dyn RegistrationSource>>,
  decorators: Vec<DecoratorEntry>,
  interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_options(mut self, options: ContainerOptions) -> Self {
    self.options = options;
    self
  }

  pub fn options_mut(&mut self) -> &mut ContainerOptions {
    &mut self.options
  }

  fn attach<C: ?Sized + Any + Send + Sync>(&mut self, registration: Registration) -> RegistrationBuilder<'_, C> {
    let index = self.registrations.len();
    self.registrations.push(registration);
    RegistrationBuilder::attached(&mut self.registrations[index])
  }

  // --- Registration ---

  /// Registers `C`, constructed through its [`Component`] impl.
  pub fn register_type<C: Component>(&mut self) -> RegistrationBuilder<'_, C> {
    self.attach(Registration::of_type::<C>().build())
  }

  /// Registers `C`, constructed by `factory`.
  pub fn register_factory<C, F>(&mut self, factory: F) -> RegistrationBuilder<'_, C>
  where
    C: Any + Send + Sync,
    F: Fn(&ResolutionContext<'_>) -> Result<C, BoxError> + Send + Sync + 'static,
  {
    self.attach(Registration::factory::<C, F>(factory).build())
  }

  /// Registers a factory returning `Arc<C>`, usually a trait object.
  pub fn register_arc_factory<C, F>(&mut self, factory: F) -> RegistrationBuilder<'_, C>
  where
    C: ?Sized + Any + Send + Sync,
    F: Fn(&ResolutionContext<'_>) -> Result<Arc<C>, BoxError> + Send + Sync + 'static,
  {
    self.attach(Registration::arc_factory::<C, F>(factory).build())
  }

  /// Registers a pre-built singleton that the container never releases.
  pub fn register_instance<C: Any + Send + Sync>(&mut self, value: C) -> RegistrationBuilder<'_, C> {
    self.attach(Registration::instance(value).build())
  }

  pub fn register_arc_instance<C: ?Sized + Any + Send + Sync>(
    &mut self,
    value: Arc<C>,
  ) -> RegistrationBuilder<'_, C> {
    self.attach(Registration::arc_instance(value).build())
  }

  /// Adds a registration built with `Registration::*`.
  pub fn register(&mut self, registration: Registration) -> &mut Self {
    self.registrations.push(registration);
    self
  }

  // --- Sources ---

  pub fn register_source(&mut self, source: impl RegistrationSource) -> &mut Self {
    self.sources.push(Arc::new(source));
    self
  }

  /// Provides one `T` for every registration of `A`.
  pub fn register_adapter<A, T>(
    &mut self,
    adapt: impl Fn(Arc<A>) -> Arc<T> + Send + Sync + 'static,
  ) -> &mut Self
  where
    A: ?Sized + Any + Send + Sync,
    T: ?Sized + Any + Send + Sync,
  {
    self.register_source(AdapterSource::<A, T>::new(adapt))
  }

  // --- Decorators ---

  /// Decorates every unnamed `I`, whichever registration provides it.
  pub fn add_decorator<I, F>(&mut self, wrap: F) -> &mut Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    self.decorators.push(DecoratorEntry::for_service::<I, F>(wrap));
    self
  }

  /// Decorates `I` registered under `name`.
  pub fn add_named_decorator<I, F>(&mut self, name: &str, wrap: F) -> &mut Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    self.decorators.push(DecoratorEntry::for_named::<I, F>(name, wrap));
    self
  }

  /// Registers the unnamed `I` as the `I` named `from`, wrapped by `wrap`.
  ///
  /// The decorator takes the lifetime of the newest registration of the named
  /// service at the time of the call; change it on the returned builder.
  pub fn register_decorator<I, F>(&mut self, from: &str, wrap: F) -> RegistrationBuilder<'_, I>
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    let from_key = ServiceKey::named::<I>(from);
    let lifetime = self
      .registrations
      .iter()
      .rev()
      .find(|registration| registration.provides(&from_key))
      .map(|registration| registration.lifetime().clone())
      .unwrap_or_default();

    let inner = from.to_owned();
    let registration = Registration::arc_factory::<I, _>(move |ctx| {
      let decorated = ctx.resolve_named::<I>(&inner)?;
      wrap(decorated, ctx)
    })
    .lifetime(lifetime)
    .build();
    self.attach(registration)
  }

  // --- Interceptors ---

  /// Adds an interceptor applied to every intercepted registration, outside
  /// the registration's own interceptors.
  pub fn add_interceptor(&mut self, interceptor: impl Interceptor) -> &mut Self {
    self.interceptors.push(Arc::new(interceptor));
    self
  }

  /// Finalizes the registrations. Fails with `Error::DuplicateKey` when
  /// strict registration is on and two registrations share a key.
  pub fn build(self) -> Result<Container> {
    let mut registry = Registry::new(self.options.strict_registration);
    for registration in self.registrations {
      registry.register(registration)?;
    }
    info!(
      registrations = registry.len(),
      sources = self.sources.len(),
      decorators = self.decorators.len(),
      interceptors = self.interceptors.len(),
      "container built"
    );

    let core = Core {
      registry,
      sources: self.sources,
      decorators: self.decorators,
      interceptors: self.interceptors,
      options: self.options,
    };
    Ok(Container {
      root: Scope::from_inner(ScopeInner::root(Arc::new(core))),
    })
  }
}

/// A finalized container. Resolutions through it use the root scope.
pub struct Container {
  root: Scope,
}

impl Container {
  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  /// Builds a container from ready-made registrations and sources with the
  /// default options.
  pub fn build(
    registrations: impl IntoIterator<Item = Registration>,
    sources: impl IntoIterator<Item = Arc<dyn RegistrationSource>>,
  ) -> Result<Container> {
    let mut builder = ContainerBuilder::new();
    builder.registrations.extend(registrations);
    builder.sources.extend(sources);
    builder.build()
  }

  pub fn root(&self) -> &Scope {
    &self.root
  }

  pub fn create_child(&self) -> Scope {
    self.root.create_child()
  }

  pub fn create_tagged_child(&self, tag: &str) -> Scope {
    self.root.create_tagged_child(tag)
  }

  pub fn registry(&self) -> &Registry {
    &self.root.inner.core.registry
  }

  /// Returns `true` if the registry has a registration for `T`. Sources are
  /// not consulted.
  pub fn is_registered<T: ?Sized + Any>(&self) -> bool {
    self.registry().contains(&ServiceKey::of::<T>())
  }

  pub fn options(&self) -> &ContainerOptions {
    &self.root.inner.core.options
  }

  // --- Resolution ---

  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
    self.root.resolve::<T>()
  }

  pub fn resolve_named<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResolutionError> {
    self.root.resolve_named::<T>(name)
  }

  pub fn resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Arc<T>, ResolutionError> {
    self.root.resolve_key::<T>(key)
  }

  pub fn try_resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, ResolutionError> {
    self.root.try_resolve::<T>()
  }

  pub fn try_resolve_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Option<Arc<T>>, ResolutionError> {
    self.root.try_resolve_key::<T>(key)
  }

  pub fn resolve_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.root.resolve_all::<T>()
  }

  pub fn resolve_all_key<T: ?Sized + Any + Send + Sync>(
    &self,
    key: &ServiceKey,
  ) -> Result<Vec<Arc<T>>, ResolutionError> {
    self.root.resolve_all_key::<T>(key)
  }

  pub fn lazy<T: ?Sized + Any + Send + Sync>(&self) -> Lazy<T> {
    self.root.lazy::<T>()
  }

  /// Disposes every live scope, then the root.
  pub fn dispose(&self) -> Result<()> {
    self.root.dispose_cascade()
  }
}
