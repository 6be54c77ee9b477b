use fibre_di::{ContainerBuilder, MetaValue, ServiceKey};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// --- Test Fixtures ---

trait Exporter: Send + Sync {
  fn format(&self) -> &'static str;
}

struct CsvExporter;
impl Exporter for CsvExporter {
  fn format(&self) -> &'static str {
    "csv"
  }
}

struct JsonExporter;
impl Exporter for JsonExporter {
  fn format(&self) -> &'static str {
    "json"
  }
}

struct XmlExporter;
impl Exporter for XmlExporter {
  fn format(&self) -> &'static str {
    "xml"
  }
}

fn build_container() -> fibre_di::Container {
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(CsvExporter))
    .as_service::<dyn Exporter>(|e| e as Arc<dyn Exporter>)
    .with_metadata("extension", "csv")
    .with_metadata("streaming", true)
    .with_metadata("priority", 1);
  builder
    .register_factory(|_| Ok(JsonExporter))
    .as_service::<dyn Exporter>(|e| e as Arc<dyn Exporter>)
    .with_metadata("extension", "json")
    .with_metadata("streaming", true)
    .with_metadata("priority", 2);
  builder
    .register_factory(|_| Ok(XmlExporter))
    .as_service::<dyn Exporter>(|e| e as Arc<dyn Exporter>)
    .with_metadata("extension", "xml")
    .with_metadata("streaming", false);
  builder.build().unwrap()
}

fn formats(exporters: &[Arc<dyn Exporter>]) -> Vec<&'static str> {
  exporters.iter().map(|e| e.format()).collect()
}

// --- Metadata Tests ---

#[test]
fn test_filter_selects_matching_registration() {
  // Arrange
  let container = build_container();
  let key = ServiceKey::of::<dyn Exporter>().with_metadata("extension", "json");

  // Act
  let exporter = container.resolve_key::<dyn Exporter>(&key).unwrap();

  // Assert
  assert_eq!(exporter.format(), "json");
}

#[test]
fn test_filter_applies_to_resolve_all() {
  let container = build_container();
  let key = ServiceKey::of::<dyn Exporter>().with_metadata("streaming", true);

  let streaming = container.resolve_all_key::<dyn Exporter>(&key).unwrap();

  assert_eq!(formats(&streaming), vec!["csv", "json"]);
}

#[test]
fn test_every_constraint_must_hold() {
  let container = build_container();
  let key = ServiceKey::of::<dyn Exporter>()
    .with_metadata("streaming", true)
    .with_metadata("priority", 1);

  let matching = container.resolve_all_key::<dyn Exporter>(&key).unwrap();

  assert_eq!(formats(&matching), vec!["csv"]);
}

#[test]
fn test_values_compare_by_type() {
  let container = build_container();
  // "1" is a string, the registration stored an integer.
  let key = ServiceKey::of::<dyn Exporter>().with_metadata("priority", "1");

  assert!(container.resolve_all_key::<dyn Exporter>(&key).unwrap().is_empty());
}

#[test]
fn test_unmatched_filter_is_not_registered() {
  let container = build_container();
  let key = ServiceKey::of::<dyn Exporter>().with_metadata("extension", "pdf");

  match container.resolve_key::<dyn Exporter>(&key) {
    Err(err) => {
      assert!(err.is_not_registered());
      assert!(err.to_string().contains(r#"extension="pdf""#));
    }
    Ok(_) => panic!("filter should not match"),
  }
}

#[test]
fn test_registry_exposes_metadata() {
  let container = build_container();

  let extensions: Vec<String> = container
    .registry()
    .lookup(&ServiceKey::of::<dyn Exporter>())
    .iter()
    .filter_map(|registration| registration.metadata().get("extension"))
    .filter_map(|value| match value {
      MetaValue::Str(extension) => Some(extension.clone()),
      _ => None,
    })
    .collect();
  let unprioritized = container
    .registry()
    .iter()
    .filter(|registration| !registration.metadata().contains_key("priority"))
    .count();

  assert_eq!(extensions, vec!["csv", "json", "xml"]);
  assert_eq!(unprioritized, 1);
  assert_eq!(
    container.registry().iter().next().and_then(|r| r.metadata().get("priority").cloned()),
    Some(MetaValue::Int(1))
  );
}

#[test]
fn test_artwork_filtered_by_age() {
  trait Artwork: Send + Sync {
    fn title(&self) -> &'static str;
  }
  struct CenturyArtwork;
  impl Artwork for CenturyArtwork {
    fn title(&self) -> &'static str {
      "century"
    }
  }
  struct MillennialArtwork;
  impl Artwork for MillennialArtwork {
    fn title(&self) -> &'static str {
      "millennial"
    }
  }

  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(CenturyArtwork))
    .as_service::<dyn Artwork>(|a| a as Arc<dyn Artwork>)
    .with_metadata("Age", 100);
  builder
    .register_factory(|_| Ok(MillennialArtwork))
    .as_service::<dyn Artwork>(|a| a as Arc<dyn Artwork>)
    .with_metadata("Age", 1000);
  let container = builder.build().unwrap();

  let century = ServiceKey::of::<dyn Artwork>().with_metadata("Age", 100);
  let millennial = ServiceKey::of::<dyn Artwork>().with_metadata("Age", 1000);

  assert_eq!(container.resolve_key::<dyn Artwork>(&century).unwrap().title(), "century");
  assert_eq!(container.resolve_key::<dyn Artwork>(&millennial).unwrap().title(), "millennial");
}
