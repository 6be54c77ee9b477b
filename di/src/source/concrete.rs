use crate::component::Component;
use crate::core::Lifetime;
use crate::error::ResolutionError;
use crate::key::ServiceKey;
use crate::registration::Registration;
use crate::resolver::ResolutionContext;
use crate::source::RegistrationSource;

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Resolves concrete types that were never registered.
///
/// Rust has no runtime constructor discovery, so the types this source can
/// build are listed up front with [`with_default`](Self::with_default) or
/// [`with_component`](Self::with_component). Only unnamed keys are served.
/// Each type gets one registration, kept for the lifetime of the source, so
/// shared lifetimes behave as if the type had been registered.
pub struct ConcreteTypeSource {
  registrations: HashMap<TypeId, Registration>,
  lifetime: Lifetime,
}

impl Default for ConcreteTypeSource {
  fn default() -> Self {
    Self::new()
  }
}

impl ConcreteTypeSource {
  pub fn new() -> Self {
    Self {
      registrations: HashMap::new(),
      lifetime: Lifetime::Transient,
    }
  }

  /// The lifetime of every registration this source provides.
  pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
    for registration in self.registrations.values_mut() {
      registration.lifetime = lifetime.clone();
    }
    self.lifetime = lifetime;
    self
  }

  /// Builds `T` with `T::default()`.
  pub fn with_default<T: Default + Any + Send + Sync>(self) -> Self {
    self.insert::<T>(Registration::factory::<T, _>(|_| Ok(T::default())).build())
  }

  /// Builds `T` through its [`Component`] impl.
  pub fn with_component<T: Component>(self) -> Self {
    self.insert::<T>(Registration::of_type::<T>().build())
  }

  fn insert<T: Any>(mut self, mut registration: Registration) -> Self {
    registration.lifetime = self.lifetime.clone();
    self.registrations.insert(TypeId::of::<T>(), registration);
    self
  }
}

impl RegistrationSource for ConcreteTypeSource {
  fn can_provide(&self, key: &ServiceKey) -> bool {
    key.name().is_none() && self.registrations.contains_key(&key.type_id())
  }

  fn provide(&self, key: &ServiceKey, ctx: &ResolutionContext<'_>) -> Result<Registration, ResolutionError> {
    if key.name().is_some() {
      return Err(ctx.not_registered(key));
    }
    self
      .registrations
      .get(&key.type_id())
      .cloned()
      .ok_or_else(|| ctx.not_registered(key))
  }

  fn name(&self) -> &str {
    "ConcreteTypeSource"
  }
}
