use crate::core::BoxError;
use crate::key::ServiceKey;
use crate::scope::ScopeId;

use std::fmt;
use thiserror::Error;

/// The ordered chain of service keys from the root request down to the point
/// of failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyChain(pub Vec<ServiceKey>);

impl KeyChain {
  pub fn keys(&self) -> &[ServiceKey] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for KeyChain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("<root>");
    }
    for (i, key) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(" -> ")?;
      }
      write!(f, "{}", key)?;
    }
    Ok(())
  }
}

/// What went wrong while resolving a service.
#[derive(Debug, Error)]
pub enum ErrorKind {
  #[error("no registration or source provides {0}")]
  NotRegistered(ServiceKey),

  #[error("{count} registrations match {key} and strict cardinality is enabled")]
  AmbiguousRegistration { key: ServiceKey, count: usize },

  #[error("circular dependency detected: {0}")]
  CircularDependency(KeyChain),

  #[error("failed to construct {key}: {source}")]
  Factory {
    key: ServiceKey,
    #[source]
    source: BoxError,
  },

  #[error("no enclosing scope is tagged {tag:?} for {key}")]
  NoMatchingScope { key: ServiceKey, tag: String },

  #[error("scope {0} has been disposed")]
  ScopeDisposed(ScopeId),

  #[error("resolution depth exceeded the limit of {0}")]
  DepthExceeded(usize),

  #[error("registration for {key} did not produce a value of type {expected}")]
  TypeMismatch { key: ServiceKey, expected: &'static str },
}

/// A failed resolution, with the key chain that led to it.
#[derive(Debug, Error)]
#[error("{kind} (resolution path: {chain})")]
pub struct ResolutionError {
  #[source]
  kind: ErrorKind,
  chain: KeyChain,
}

impl ResolutionError {
  pub fn new(kind: ErrorKind, chain: KeyChain) -> Self {
    Self { kind, chain }
  }

  pub fn kind(&self) -> &ErrorKind {
    &self.kind
  }

  pub fn chain(&self) -> &KeyChain {
    &self.chain
  }

  pub fn into_kind(self) -> ErrorKind {
    self.kind
  }

  pub fn is_not_registered(&self) -> bool {
    matches!(self.kind, ErrorKind::NotRegistered(_))
  }

  pub fn is_circular(&self) -> bool {
    matches!(self.kind, ErrorKind::CircularDependency(_))
  }
}

/// The error type for container and scope operations.
#[derive(Debug, Error)]
pub enum Error {
  #[error("duplicate registration for {0} while strict registration is enabled")]
  DuplicateKey(ServiceKey),

  #[error("scope {scope} still has {live_children} live child scope(s)")]
  ScopeNotEmpty { scope: ScopeId, live_children: usize },

  #[error(transparent)]
  Resolution(#[from] ResolutionError),
}

/// A specialized `Result` type for container operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chain_renders_in_request_order() {
    let chain = KeyChain(vec![ServiceKey::of::<u8>(), ServiceKey::named::<u16>("b")]);
    assert_eq!(chain.to_string(), "u8 -> u16(\"b\")");
    assert_eq!(KeyChain::default().to_string(), "<root>");
  }

  #[test]
  fn resolution_error_mentions_kind_and_path() {
    let key = ServiceKey::of::<u32>();
    let err = ResolutionError::new(ErrorKind::NotRegistered(key.clone()), KeyChain(vec![key]));
    assert!(err.is_not_registered());
    assert_eq!(
      err.to_string(),
      "no registration or source provides u32 (resolution path: u32)"
    );
  }
}
