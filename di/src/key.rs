//! Service identity and registration metadata.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value attached to a registration under a metadata name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetaValue {
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl fmt::Display for MetaValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MetaValue::Bool(v) => write!(f, "{}", v),
      MetaValue::Int(v) => write!(f, "{}", v),
      MetaValue::Float(v) => write!(f, "{}", v),
      MetaValue::Str(v) => write!(f, "{:?}", v),
    }
  }
}

impl From<bool> for MetaValue {
  fn from(value: bool) -> Self {
    MetaValue::Bool(value)
  }
}

impl From<i32> for MetaValue {
  fn from(value: i32) -> Self {
    MetaValue::Int(i64::from(value))
  }
}

impl From<i64> for MetaValue {
  fn from(value: i64) -> Self {
    MetaValue::Int(value)
  }
}

impl From<u32> for MetaValue {
  fn from(value: u32) -> Self {
    MetaValue::Int(i64::from(value))
  }
}

impl From<f64> for MetaValue {
  fn from(value: f64) -> Self {
    MetaValue::Float(value)
  }
}

impl From<&str> for MetaValue {
  fn from(value: &str) -> Self {
    MetaValue::Str(value.to_owned())
  }
}

impl From<String> for MetaValue {
  fn from(value: String) -> Self {
    MetaValue::Str(value)
  }
}

/// Metadata of a registration, ordered by name.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Identifies a requested capability.
///
/// Two keys are equal when they name the same type and the same (optional)
/// name. The metadata filter only narrows the candidate registrations during
/// lookup and never takes part in equality or hashing.
#[derive(Clone)]
pub struct ServiceKey {
  type_id: TypeId,
  type_name: &'static str,
  name: Option<Arc<str>>,
  filter: Vec<(String, MetaValue)>,
}

impl ServiceKey {
  /// The unnamed key for `T`.
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      name: None,
      filter: Vec::new(),
    }
  }

  /// The key for `T` registered under `name`.
  pub fn named<T: ?Sized + Any>(name: &str) -> Self {
    Self::of::<T>().with_name(name)
  }

  pub fn with_name(mut self, name: &str) -> Self {
    self.name = Some(Arc::from(name));
    self
  }

  /// Adds a metadata equality constraint. Every constraint must hold for a
  /// registration to be a candidate.
  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
    self.filter.push((key.into(), value.into()));
    self
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn filter(&self) -> &[(String, MetaValue)] {
    &self.filter
  }

  pub fn is_type<T: ?Sized + Any>(&self) -> bool {
    self.type_id == TypeId::of::<T>()
  }

  /// Returns `true` if `metadata` satisfies every constraint of this key.
  pub fn matches(&self, metadata: &Metadata) -> bool {
    self
      .filter
      .iter()
      .all(|(name, expected)| metadata.get(name) == Some(expected))
  }

  /// The same key with the metadata filter stripped.
  pub(crate) fn identity(&self) -> ServiceKey {
    Self {
      type_id: self.type_id,
      type_name: self.type_name,
      name: self.name.clone(),
      filter: Vec::new(),
    }
  }
}

impl PartialEq for ServiceKey {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id && self.name == other.name
  }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
    self.name.hash(state);
  }
}

impl fmt::Display for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name)?;
    if let Some(name) = &self.name {
      write!(f, "(\"{}\")", name)?;
    }
    if !self.filter.is_empty() {
      f.write_str(" {")?;
      for (i, (name, value)) in self.filter.iter().enumerate() {
        if i > 0 {
          f.write_str(", ")?;
        }
        write!(f, "{}={}", name, value)?;
      }
      f.write_str("}")?;
    }
    Ok(())
  }
}

impl fmt::Debug for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ServiceKey({})", self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  trait Artwork {}

  #[test]
  fn equality_ignores_metadata_filter() {
    let plain = ServiceKey::of::<dyn Artwork>();
    let filtered = ServiceKey::of::<dyn Artwork>().with_metadata("Age", 100);
    assert_eq!(plain, filtered);

    let mut set = HashSet::new();
    set.insert(plain);
    assert!(set.contains(&filtered));
  }

  #[test]
  fn names_distinguish_keys() {
    assert_ne!(ServiceKey::of::<String>(), ServiceKey::named::<String>("a"));
    assert_ne!(ServiceKey::named::<String>("a"), ServiceKey::named::<String>("b"));
    assert_eq!(ServiceKey::named::<String>("a"), ServiceKey::named::<String>("a"));
  }

  #[test]
  fn filter_requires_every_constraint() {
    let mut metadata = Metadata::new();
    metadata.insert("Age".into(), MetaValue::Int(100));
    metadata.insert("Style".into(), "baroque".into());

    assert!(ServiceKey::of::<u8>().matches(&metadata));
    assert!(ServiceKey::of::<u8>().with_metadata("Age", 100).matches(&metadata));
    assert!(!ServiceKey::of::<u8>().with_metadata("Age", 1000).matches(&metadata));
    assert!(!ServiceKey::of::<u8>()
      .with_metadata("Age", 100)
      .with_metadata("Style", "gothic")
      .matches(&metadata));
    assert!(!ServiceKey::of::<u8>().with_metadata("Missing", true).matches(&metadata));
  }

  #[test]
  fn display_includes_name_and_filter() {
    let key = ServiceKey::named::<u32>("answer").with_metadata("Age", 100);
    assert_eq!(key.to_string(), "u32(\"answer\") {Age=100}");
  }
}
