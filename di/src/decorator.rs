//! Decorators wrap a resolved service in another implementation of the same
//! service.

use crate::core::{erase, unerase, BoxError, DecorateFn, Instance};
use crate::key::ServiceKey;
use crate::resolver::ResolutionContext;

use std::any::Any;
use std::sync::Arc;

/// A decorator targeting one service key.
#[derive(Clone)]
pub(crate) struct DecoratorEntry {
  pub(crate) target: ServiceKey,
  pub(crate) wrap: DecorateFn,
}

impl DecoratorEntry {
  pub(crate) fn for_service<I, F>(wrap: F) -> Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    Self::for_key::<I, F>(ServiceKey::of::<I>(), wrap)
  }

  pub(crate) fn for_named<I, F>(name: &str, wrap: F) -> Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    Self::for_key::<I, F>(ServiceKey::named::<I>(name), wrap)
  }

  fn for_key<I, F>(target: ServiceKey, wrap: F) -> Self
  where
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<I>, &ResolutionContext<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    let wrap: DecorateFn = Arc::new(move |instance, ctx| {
      let inner = unerase::<I>(&instance).ok_or_else(|| {
        BoxError::from(format!(
          "decorator target is not a {}",
          std::any::type_name::<I>()
        ))
      })?;
      wrap(inner, ctx).map(erase)
    });
    Self { target, wrap }
  }

  /// Container-level decorators match the exact key, name included.
  pub(crate) fn applies_to(&self, key: &ServiceKey) -> bool {
    self.target == *key
  }

  /// Registration-local decorators match the service type under any name.
  pub(crate) fn applies_to_type(&self, key: &ServiceKey) -> bool {
    self.target.type_id() == key.type_id()
  }

  pub(crate) fn apply(&self, instance: Instance, ctx: &ResolutionContext<'_>) -> Result<Instance, BoxError> {
    (self.wrap)(instance, ctx)
  }
}
