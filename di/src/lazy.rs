use crate::error::{ErrorKind, KeyChain, ResolutionError};
use crate::key::ServiceKey;
use crate::scope::{Scope, ScopeId, ScopeInner};

use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// A resolution of `T` deferred until the first call to [`get`](Lazy::get).
///
/// The result is cached, so later calls return the same `Arc`. A `Lazy` does
/// not keep its scope alive; once the scope is gone `get` reports
/// `ErrorKind::ScopeDisposed`.
pub struct Lazy<T: ?Sized> {
  scope: Weak<ScopeInner>,
  scope_id: ScopeId,
  key: ServiceKey,
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Any + Send + Sync> Lazy<T> {
  pub(crate) fn new(scope: &Arc<ScopeInner>, key: ServiceKey) -> Self {
    Self {
      scope: Arc::downgrade(scope),
      scope_id: scope.id,
      key,
      cell: OnceCell::new(),
    }
  }

  pub fn get(&self) -> Result<Arc<T>, ResolutionError> {
    self
      .cell
      .get_or_try_init(|| {
        let scope = self.scope.upgrade().ok_or_else(|| {
          ResolutionError::new(
            ErrorKind::ScopeDisposed(self.scope_id),
            KeyChain(vec![self.key.clone()]),
          )
        })?;
        Scope::from_inner(scope).resolve_key::<T>(&self.key)
      })
      .cloned()
  }

  pub fn is_resolved(&self) -> bool {
    self.cell.get().is_some()
  }

  pub fn key(&self) -> &ServiceKey {
    &self.key
  }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lazy")
      .field("key", &self.key)
      .field("scope", &self.scope_id)
      .field("resolved", &self.cell.get().is_some())
      .finish()
  }
}
