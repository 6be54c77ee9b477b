use crate::core::{Lifetime, RegistrationId};
use crate::error::ResolutionError;
use crate::key::ServiceKey;
use crate::registration::Registration;
use crate::resolver::ResolutionContext;
use crate::source::RegistrationSource;

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Provides one `T` for every registration of `A`.
///
/// Each adapter registration resolves its own `A` registration and passes
/// the instance through `adapt`. Metadata is copied from the adapted
/// registration, so metadata filters work on adapters too.
pub struct AdapterSource<A: ?Sized, T: ?Sized> {
  adapt: Arc<dyn Fn(Arc<A>) -> Arc<T> + Send + Sync>,
  lifetime: Lifetime,
  adapters: DashMap<RegistrationId, Registration>,
}

impl<A, T> AdapterSource<A, T>
where
  A: ?Sized + Any + Send + Sync,
  T: ?Sized + Any + Send + Sync,
{
  pub fn new(adapt: impl Fn(Arc<A>) -> Arc<T> + Send + Sync + 'static) -> Self {
    Self {
      adapt: Arc::new(adapt),
      lifetime: Lifetime::Transient,
      adapters: DashMap::new(),
    }
  }

  pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
    self.lifetime = lifetime;
    self
  }

  fn adapter_for(&self, adapted: &Arc<Registration>) -> Registration {
    self
      .adapters
      .entry(adapted.id())
      .or_insert_with(|| {
        let adapt = self.adapt.clone();
        let target = adapted.clone();
        let adapted_key = ServiceKey::of::<A>();
        let mut builder = Registration::arc_factory::<T, _>(move |ctx| {
          let adapted_instance = ctx.resolve_registration::<A>(&target, &adapted_key)?;
          Ok(adapt(adapted_instance))
        })
        .lifetime(self.lifetime.clone());
        for (name, value) in adapted.metadata() {
          builder = builder.with_metadata(name.clone(), value.clone());
        }
        builder.build()
      })
      .value()
      .clone()
  }
}

impl<A, T> RegistrationSource for AdapterSource<A, T>
where
  A: ?Sized + Any + Send + Sync,
  T: ?Sized + Any + Send + Sync,
{
  fn can_provide(&self, key: &ServiceKey) -> bool {
    key.is_type::<T>() && key.name().is_none()
  }

  fn provide(&self, key: &ServiceKey, ctx: &ResolutionContext<'_>) -> Result<Registration, ResolutionError> {
    self
      .provide_all(key, ctx)?
      .pop()
      .ok_or_else(|| ctx.not_registered(key))
  }

  fn provide_all(
    &self,
    key: &ServiceKey,
    ctx: &ResolutionContext<'_>,
  ) -> Result<Vec<Registration>, ResolutionError> {
    if !self.can_provide(key) {
      return Ok(Vec::new());
    }
    let adapted = ctx.registrations_for(&ServiceKey::of::<A>())?;
    Ok(
      adapted
        .iter()
        .map(|registration| self.adapter_for(registration))
        .filter(|adapter| key.matches(adapter.metadata()))
        .collect(),
    )
  }
}
