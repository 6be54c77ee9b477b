#![cfg(feature = "serde")]

use fibre_di::{ContainerOptions, Lifetime, MetaValue};
use pretty_assertions::assert_eq;

#[test]
fn test_options_round_trip() {
  // Arrange
  let options = ContainerOptions::default()
    .with_strict_cardinality(true)
    .with_max_depth(16);

  // Act
  let json = serde_json::to_string(&options).unwrap();
  let back: ContainerOptions = serde_json::from_str(&json).unwrap();

  // Assert
  assert_eq!(back, options);
}

#[test]
fn test_missing_option_fields_take_defaults() {
  let options: ContainerOptions = serde_json::from_str(r#"{ "strict_registration": true }"#).unwrap();

  assert_eq!(
    options,
    ContainerOptions::default().with_strict_registration(true)
  );
  assert_eq!(options.max_depth, 128);
}

#[test]
fn test_lifetimes_round_trip() {
  let lifetimes = vec![
    Lifetime::Transient,
    Lifetime::Scoped,
    Lifetime::Singleton,
    Lifetime::MatchingScope("request".to_string()),
  ];

  let json = serde_json::to_string(&lifetimes).unwrap();
  let back: Vec<Lifetime> = serde_json::from_str(&json).unwrap();

  assert_eq!(back, lifetimes);
}

#[test]
fn test_metadata_values_read_as_plain_json() {
  let values: Vec<MetaValue> = serde_json::from_str(r#"[true, 3, 1.5, "pdf"]"#).unwrap();

  assert_eq!(
    values,
    vec![
      MetaValue::Bool(true),
      MetaValue::Int(3),
      MetaValue::Float(1.5),
      MetaValue::Str("pdf".to_string()),
    ]
  );
  assert_eq!(serde_json::to_string(&values).unwrap(), r#"[true,3,1.5,"pdf"]"#);
}
