use fibre_di::{BoxError, ContainerBuilder, ErrorKind, ServiceKey};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

struct PlainGreeter;
impl Greeter for PlainGreeter {
  fn greet(&self) -> String {
    "hello".to_string()
  }
}

struct Bracketed(Arc<dyn Greeter>);
impl Greeter for Bracketed {
  fn greet(&self) -> String {
    format!("[{}]", self.0.greet())
  }
}

struct Shouting(Arc<dyn Greeter>);
impl Greeter for Shouting {
  fn greet(&self) -> String {
    self.0.greet().to_uppercase()
  }
}

struct Exclaiming(Arc<dyn Greeter>);
impl Greeter for Exclaiming {
  fn greet(&self) -> String {
    format!("{}!", self.0.greet())
  }
}

fn register_plain(builder: &mut ContainerBuilder) {
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_service::<dyn Greeter>(|g| g as Arc<dyn Greeter>);
}

// --- Decorator Tests ---

#[test]
fn test_container_decorators_apply_in_registration_order() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  register_plain(&mut builder);
  builder.add_decorator::<dyn Greeter, _>(|inner, _| Ok(Arc::new(Bracketed(inner)) as Arc<dyn Greeter>));
  builder.add_decorator::<dyn Greeter, _>(|inner, _| Ok(Arc::new(Exclaiming(inner)) as Arc<dyn Greeter>));
  let container = builder.build().unwrap();

  // Act
  let greeter = container.resolve::<dyn Greeter>().unwrap();

  // Assert
  assert_eq!(greeter.greet(), "[hello]!");
}

#[test]
fn test_registration_decorators_run_before_container_decorators() {
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_service::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
    .decorate::<dyn Greeter, _>(|inner, _| Ok(Arc::new(Shouting(inner)) as Arc<dyn Greeter>));
  builder.add_decorator::<dyn Greeter, _>(|inner, _| Ok(Arc::new(Bracketed(inner)) as Arc<dyn Greeter>));
  let container = builder.build().unwrap();

  assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "[HELLO]");
}

#[test]
fn test_shared_services_are_decorated_once() {
  let applied = Arc::new(AtomicUsize::new(0));
  let counter = applied.clone();
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_service::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
    .singleton();
  builder.add_decorator::<dyn Greeter, _>(move |inner, _| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(Arc::new(Bracketed(inner)) as Arc<dyn Greeter>)
  });
  let container = builder.build().unwrap();

  let first = container.resolve::<dyn Greeter>().unwrap();
  let second = container.create_child().resolve::<dyn Greeter>().unwrap();

  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(applied.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_services_are_decorated_every_time() {
  let applied = Arc::new(AtomicUsize::new(0));
  let counter = applied.clone();
  let mut builder = ContainerBuilder::new();
  register_plain(&mut builder);
  builder.add_decorator::<dyn Greeter, _>(move |inner, _| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(inner)
  });
  let container = builder.build().unwrap();

  container.resolve::<dyn Greeter>().unwrap();
  container.resolve::<dyn Greeter>().unwrap();

  assert_eq!(applied.load(Ordering::SeqCst), 2);
}

#[test]
fn test_named_decorator_only_touches_its_key() {
  let mut builder = ContainerBuilder::new();
  register_plain(&mut builder);
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_named_service::<dyn Greeter>("loud", |g| g as Arc<dyn Greeter>);
  builder.add_named_decorator::<dyn Greeter, _>("loud", |inner, _| {
    Ok(Arc::new(Shouting(inner)) as Arc<dyn Greeter>)
  });
  let container = builder.build().unwrap();

  assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hello");
  assert_eq!(container.resolve_named::<dyn Greeter>("loud").unwrap().greet(), "HELLO");
}

#[test]
fn test_unnamed_decorator_ignores_named_keys() {
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_named_service::<dyn Greeter>("quiet", |g| g as Arc<dyn Greeter>);
  builder.add_decorator::<dyn Greeter, _>(|inner, _| Ok(Arc::new(Shouting(inner)) as Arc<dyn Greeter>));
  let container = builder.build().unwrap();

  assert_eq!(container.resolve_named::<dyn Greeter>("quiet").unwrap().greet(), "hello");
}

#[test]
fn test_register_decorator_wraps_named_implementation() {
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(PlainGreeter))
    .as_named_service::<dyn Greeter>("inner", |g| g as Arc<dyn Greeter>)
    .singleton();
  builder.register_decorator::<dyn Greeter, _>("inner", |inner, _| {
    Ok(Arc::new(Exclaiming(inner)) as Arc<dyn Greeter>)
  });
  let container = builder.build().unwrap();

  let first = container.resolve::<dyn Greeter>().unwrap();
  let second = container.resolve::<dyn Greeter>().unwrap();

  assert_eq!(first.greet(), "hello!");
  // The decorator copied the singleton lifetime of the wrapped registration.
  assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_decorator_dependencies_come_from_the_context() {
  let mut builder = ContainerBuilder::new();
  register_plain(&mut builder);
  builder.register_instance(String::from(" (decorated)"));
  builder.add_decorator::<dyn Greeter, _>(|inner, ctx| {
    let suffix = ctx.resolve::<String>()?;
    let greeting = format!("{}{}", inner.greet(), suffix);
    Ok(Arc::new(Fixed(greeting)) as Arc<dyn Greeter>)
  });
  let container = builder.build().unwrap();

  assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hello (decorated)");
}

struct Fixed(String);
impl Greeter for Fixed {
  fn greet(&self) -> String {
    self.0.clone()
  }
}

#[test]
fn test_failing_decorator_is_a_factory_error() {
  let mut builder = ContainerBuilder::new();
  register_plain(&mut builder);
  builder.add_decorator::<dyn Greeter, _>(|_, _| Err::<Arc<dyn Greeter>, BoxError>("no decoration today".into()));
  let container = builder.build().unwrap();

  match container.resolve::<dyn Greeter>() {
    Err(err) => assert!(matches!(err.kind(), ErrorKind::Factory { .. })),
    Ok(_) => panic!("decorator failure was swallowed"),
  }
}

#[test]
fn test_decorator_resolving_its_own_service_is_circular() {
  trait Report: Send + Sync {}
  struct MonthlyReport;
  impl Report for MonthlyReport {}

  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(MonthlyReport))
    .as_service::<dyn Report>(|r| r as Arc<dyn Report>)
    .singleton();
  builder.add_decorator::<dyn Report, _>(|inner, ctx| {
    ctx.resolve::<dyn Report>()?;
    Ok(inner)
  });
  let container = builder.build().unwrap();

  for _ in 0..2 {
    match container.resolve::<dyn Report>() {
      Err(err) => {
        assert!(err.is_circular());
        assert_eq!(
          err.chain().keys().to_vec(),
          vec![ServiceKey::of::<dyn Report>(), ServiceKey::of::<dyn Report>()]
        );
      }
      Ok(_) => panic!("a decorator depending on itself resolved"),
    }
  }
}
