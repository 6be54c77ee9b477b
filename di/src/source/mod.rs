//! Registration sources: fallbacks consulted, in the order they were added,
//! when the registry has nothing for a key.
//!
//! A source never writes into the registry. If it wants shared lifetimes to
//! work it must hand out the same registration (same id) for the same key,
//! which the built-in sources do.

mod adapter;
mod concrete;
mod delegating;

pub use adapter::AdapterSource;
pub use concrete::ConcreteTypeSource;
pub use delegating::DelegatingSource;

use crate::error::ResolutionError;
use crate::key::ServiceKey;
use crate::registration::Registration;
use crate::resolver::ResolutionContext;

pub trait RegistrationSource: Send + Sync + 'static {
  /// A cheap check run before `provide_all`.
  fn can_provide(&self, key: &ServiceKey) -> bool;

  /// One registration for `key`, or `ErrorKind::NotRegistered` so the next
  /// source gets a turn.
  fn provide(&self, key: &ServiceKey, ctx: &ResolutionContext<'_>) -> Result<Registration, ResolutionError>;

  /// Every registration this source has for `key`.
  fn provide_all(
    &self,
    key: &ServiceKey,
    ctx: &ResolutionContext<'_>,
  ) -> Result<Vec<Registration>, ResolutionError> {
    match self.provide(key, ctx) {
      Ok(registration) => Ok(vec![registration]),
      Err(err) if err.is_not_registered() => Ok(Vec::new()),
      Err(err) => Err(err),
    }
  }

  fn name(&self) -> &str {
    std::any::type_name::<Self>()
  }
}
