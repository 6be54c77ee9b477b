use crate::core::{BoxError, Lifetime};
use crate::error::ResolutionError;
use crate::key::ServiceKey;
use crate::registration::Registration;
use crate::resolver::ResolutionContext;
use crate::source::RegistrationSource;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Delegates construction to a factory service `F` resolved from the
/// container.
///
/// Each supported type gets a strongly typed dispatch entry. When `T` is
/// requested, the source resolves `F` and calls the entry for `T` with it.
///
/// ```
/// use fibre_di::{ContainerBuilder, DelegatingSource};
/// use std::sync::Arc;
///
/// struct Handlers;
/// impl Handlers {
///   fn greeting(&self) -> String {
///     "hello".to_string()
///   }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Handlers);
/// builder.register_source(
///   DelegatingSource::<Handlers>::new().dispatch::<String, _>(|handlers| Ok(handlers.greeting())),
/// );
/// let container = builder.build().unwrap();
/// assert_eq!(*container.resolve::<String>().unwrap(), "hello");
/// ```
pub struct DelegatingSource<F: ?Sized> {
  table: HashMap<TypeId, Registration>,
  lifetime: Lifetime,
  _factory: PhantomData<fn() -> Arc<F>>,
}

impl<F: ?Sized + Any + Send + Sync> Default for DelegatingSource<F> {
  fn default() -> Self {
    Self::new()
  }
}

impl<F: ?Sized + Any + Send + Sync> DelegatingSource<F> {
  pub fn new() -> Self {
    Self {
      table: HashMap::new(),
      lifetime: Lifetime::Transient,
      _factory: PhantomData,
    }
  }

  /// The lifetime of registrations added after this call.
  pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
    self.lifetime = lifetime;
    self
  }

  /// Serves `T` by calling `build` on the resolved factory.
  pub fn dispatch<T, B>(mut self, build: B) -> Self
  where
    T: Any + Send + Sync,
    B: Fn(&F) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let registration = Registration::factory::<T, _>(move |ctx| {
      let factory = ctx.resolve::<F>()?;
      build(&*factory)
    })
    .lifetime(self.lifetime.clone())
    .build();
    self.table.insert(TypeId::of::<T>(), registration);
    self
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}

impl<F: ?Sized + Any + Send + Sync> RegistrationSource for DelegatingSource<F> {
  fn can_provide(&self, key: &ServiceKey) -> bool {
    key.name().is_none() && self.table.contains_key(&key.type_id())
  }

  fn provide(&self, key: &ServiceKey, ctx: &ResolutionContext<'_>) -> Result<Registration, ResolutionError> {
    self
      .table
      .get(&key.type_id())
      .filter(|_| key.name().is_none())
      .cloned()
      .ok_or_else(|| ctx.not_registered(key))
  }
}
