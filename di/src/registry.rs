use crate::error::{Error, Result};
use crate::key::ServiceKey;
use crate::registration::Registration;

use std::collections::HashMap;
use std::sync::Arc;

/// The registrations of a container, indexed by service key.
///
/// Built once before the container is finalized and read without locks
/// afterwards.
#[derive(Default)]
pub struct Registry {
  registrations: Vec<Arc<Registration>>,
  by_key: HashMap<ServiceKey, Vec<usize>>,
  strict: bool,
}

impl Registry {
  pub(crate) fn new(strict: bool) -> Self {
    Self {
      strict,
      ..Self::default()
    }
  }

  /// Adds a registration. Fails with [`Error::DuplicateKey`] only in strict
  /// mode; otherwise the newest registration for a key wins at selection time.
  pub(crate) fn register(&mut self, registration: Registration) -> Result<()> {
    let keys: Vec<ServiceKey> = registration.bindings().iter().map(|b| b.key.clone()).collect();
    if self.strict {
      if let Some(taken) = keys.iter().find(|key| self.by_key.contains_key(*key)) {
        return Err(Error::DuplicateKey(taken.clone()));
      }
    }

    let index = self.registrations.len();
    self.registrations.push(Arc::new(registration));
    for key in keys {
      let slots = self.by_key.entry(key).or_default();
      if !slots.contains(&index) {
        slots.push(index);
      }
    }
    Ok(())
  }

  /// Every registration exposing `key` whose metadata satisfies the key's
  /// filter, oldest first.
  pub fn lookup(&self, key: &ServiceKey) -> Vec<Arc<Registration>> {
    self
      .by_key
      .get(key)
      .map(|slots| {
        slots
          .iter()
          .map(|&index| &self.registrations[index])
          .filter(|registration| key.matches(&registration.metadata))
          .cloned()
          .collect()
      })
      .unwrap_or_default()
  }

  /// Returns `true` if any registration exposes `key`. The filter is ignored.
  pub fn contains(&self, key: &ServiceKey) -> bool {
    self.by_key.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.registrations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registrations.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
    self.registrations.iter()
  }
}
