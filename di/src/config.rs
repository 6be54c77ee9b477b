/// Behavioral switches for a container.
///
/// The defaults match the common "last registration wins" style: duplicate
/// keys are allowed and the newest registration serves single resolutions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
  /// Reject a registration whose service key is already taken.
  pub strict_registration: bool,
  /// Fail single resolutions that match more than one registration.
  pub strict_cardinality: bool,
  /// Maximum length of the resolution path before resolution is aborted.
  pub max_depth: usize,
}

impl Default for ContainerOptions {
  fn default() -> Self {
    Self {
      strict_registration: false,
      strict_cardinality: false,
      max_depth: 128,
    }
  }
}

impl ContainerOptions {
  pub fn with_strict_registration(mut self, strict: bool) -> Self {
    self.strict_registration = strict;
    self
  }

  pub fn with_strict_cardinality(mut self, strict: bool) -> Self {
    self.strict_cardinality = strict;
    self
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Self {
    self.max_depth = max_depth;
    self
  }
}
