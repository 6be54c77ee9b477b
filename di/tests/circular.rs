use fibre_di::{
  BoxError, Component, ContainerBuilder, ContainerOptions, ErrorKind, Property, PropertyInjection,
  ResolutionContext, ServiceKey,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// --- Test Fixtures ---

#[derive(Debug)]
struct Left;
impl Component for Left {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<Right>()?;
    Ok(Left)
  }
}

#[derive(Debug)]
struct Right;
impl Component for Right {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<Left>()?;
    Ok(Right)
  }
}

#[derive(Debug)]
struct Narcissus;
impl Component for Narcissus {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<Narcissus>()?;
    Ok(Narcissus)
  }
}

#[derive(Debug, Default)]
struct Parent {
  child: Property<Child>,
}

impl Component for Parent {
  fn construct(_: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(Parent::default())
  }
}

impl PropertyInjection for Parent {
  fn inject_properties(&self, ctx: &ResolutionContext<'_>) -> Result<(), BoxError> {
    self.child.inject(ctx)?;
    Ok(())
  }
}

#[derive(Debug, Default)]
struct Child {
  parent: Property<Parent>,
}

impl Component for Child {
  fn construct(_: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(Child::default())
  }
}

impl PropertyInjection for Child {
  fn inject_properties(&self, ctx: &ResolutionContext<'_>) -> Result<(), BoxError> {
    self.parent.inject(ctx)?;
    Ok(())
  }
}

fn circular_chain(err: &fibre_di::ResolutionError) -> Vec<ServiceKey> {
  match err.kind() {
    ErrorKind::CircularDependency(chain) => chain.keys().to_vec(),
    other => panic!("expected a circular dependency, got: {}", other),
  }
}

// --- Circular Dependency Tests ---

#[test]
fn test_transient_constructor_cycle_is_detected() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Left>();
  builder.register_type::<Right>();
  let container = builder.build().unwrap();

  // Act
  let err = container.resolve::<Left>().unwrap_err();

  // Assert
  assert!(err.is_circular());
  assert_eq!(
    circular_chain(&err),
    vec![
      ServiceKey::of::<Left>(),
      ServiceKey::of::<Right>(),
      ServiceKey::of::<Left>()
    ]
  );
  assert_eq!(err.chain().keys().to_vec(), circular_chain(&err));
}

#[test]
fn test_singleton_constructor_cycle_is_detected_every_time() {
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Left>().singleton();
  builder.register_type::<Right>().singleton();
  let container = builder.build().unwrap();

  // Nothing is cached by the failed attempt, so the second attempt fails the
  // same way instead of blocking on a half-built instance.
  assert!(container.resolve::<Left>().unwrap_err().is_circular());
  assert!(container.resolve::<Right>().unwrap_err().is_circular());
  assert!(container.resolve::<Left>().unwrap_err().is_circular());
}

#[test]
fn test_self_dependency_is_detected() {
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Narcissus>().scoped();
  let container = builder.build().unwrap();

  let err = container.create_child().resolve::<Narcissus>().unwrap_err();
  assert_eq!(
    circular_chain(&err),
    vec![ServiceKey::of::<Narcissus>(), ServiceKey::of::<Narcissus>()]
  );
}

#[test]
fn test_shared_property_cycle_is_closed() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Parent>().singleton().properties_autowired();
  builder.register_type::<Child>().singleton().properties_autowired();
  let container = builder.build().unwrap();

  // Act
  let parent = container.resolve::<Parent>().unwrap();

  // Assert
  let child = parent.child.get().unwrap();
  let back = child.parent.get().unwrap();
  assert!(Arc::ptr_eq(&parent, &back));
  assert!(Arc::ptr_eq(&child, &container.resolve::<Child>().unwrap()));
}

#[test]
fn test_scoped_property_cycle_is_closed_per_scope() {
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Parent>().scoped().properties_autowired();
  builder.register_type::<Child>().scoped().properties_autowired();
  let container = builder.build().unwrap();

  let first = container.create_child();
  let second = container.create_child();
  let p1 = first.resolve::<Child>().unwrap().parent.get().unwrap();
  let p2 = second.resolve::<Child>().unwrap().parent.get().unwrap();

  assert!(Arc::ptr_eq(&p1, &first.resolve::<Parent>().unwrap()));
  assert!(!Arc::ptr_eq(&p1, &p2));
}

#[test]
fn test_transient_property_cycle_is_reported() {
  let mut builder = ContainerBuilder::new();
  builder.register_type::<Parent>().properties_autowired();
  builder.register_type::<Child>().properties_autowired();
  let container = builder.build().unwrap();

  let err = container.resolve::<Parent>().unwrap_err();
  assert_eq!(
    circular_chain(&err),
    vec![
      ServiceKey::of::<Parent>(),
      ServiceKey::of::<Child>(),
      ServiceKey::of::<Parent>()
    ]
  );
}

#[test]
fn test_constructor_and_property_mix_resolves() {
  #[derive(Debug)]
  struct Owner {
    pet: Arc<Pet>,
  }
  #[derive(Debug, Default)]
  struct Pet {
    owner: Property<Owner>,
  }

  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|ctx| Ok(Owner { pet: ctx.resolve()? }))
    .singleton();
  builder
    .register_factory(|_| Ok(Pet::default()))
    .singleton()
    .wire_properties(|pet, ctx| Ok(pet.owner.inject(ctx)?));
  let container = builder.build().unwrap();

  let owner = container.resolve::<Owner>().unwrap();
  let back = owner.pet.owner.get().unwrap();

  assert!(Arc::ptr_eq(&owner, &back));
}

#[test]
fn test_failed_property_wiring_evicts_the_instance() {
  #[derive(Debug)]
  struct Fragile;
  struct Unregistered;

  let constructed = Arc::new(AtomicUsize::new(0));
  let counter = constructed.clone();
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(Fragile)
    })
    .singleton()
    .wire_properties(|_, ctx| {
      ctx.resolve::<Unregistered>()?;
      Ok(())
    });
  let container = builder.build().unwrap();

  let err = container.resolve::<Fragile>().unwrap_err();
  assert!(err.is_not_registered());
  assert_eq!(
    err.chain().keys().to_vec(),
    vec![ServiceKey::of::<Fragile>(), ServiceKey::of::<Unregistered>()]
  );

  assert!(container.resolve::<Fragile>().is_err());
  assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_wiring_discards_the_whole_graph() {
  #[derive(Debug, Default)]
  struct Shop {
    clerk: Property<Clerk>,
  }
  #[derive(Debug, Default)]
  struct Clerk {
    shop: Property<Shop>,
  }

  // Arrange
  let late = Arc::new(AtomicBool::new(true));
  let first_day = late.clone();
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| Ok(Shop::default()))
    .singleton()
    .wire_properties(|shop, ctx| Ok(shop.clerk.inject(ctx)?));
  builder
    .register_factory(|_| Ok(Clerk::default()))
    .singleton()
    .wire_properties(move |clerk, ctx| {
      if first_day.swap(false, Ordering::SeqCst) {
        return Err("clerk is late".into());
      }
      Ok(clerk.shop.inject(ctx)?)
    });
  let container = builder.build().unwrap();

  // Act
  // The shop is wired before the clerk fails, so only discarding both keeps
  // the graph consistent.
  assert!(container.resolve::<Shop>().is_err());
  let shop = container.resolve::<Shop>().unwrap();

  // Assert
  let clerk = shop.clerk.get().unwrap();
  assert!(Arc::ptr_eq(&clerk, &container.resolve::<Clerk>().unwrap()));
  assert!(Arc::ptr_eq(&clerk.shop.get().unwrap(), &shop));
  assert!(!late.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_resolve_waits_for_property_wiring() {
  #[derive(Debug, Default)]
  struct Hub {
    spoke: Property<Spoke>,
  }
  #[derive(Debug, Default)]
  struct Spoke;

  let mut builder = ContainerBuilder::new();
  builder.register_factory(|_| Ok(Spoke)).singleton();
  builder
    .register_factory(|_| Ok(Hub::default()))
    .singleton()
    .wire_properties(|hub, ctx| {
      thread::sleep(Duration::from_millis(300));
      Ok(hub.spoke.inject(ctx)?)
    });
  let container = builder.build().unwrap();

  let resolve = || {
    let hub = container.resolve::<Hub>().unwrap();
    let wired = hub.spoke.is_set();
    (hub, wired)
  };
  let ((first, first_wired), (second, second_wired)) = thread::scope(|s| {
    let first = s.spawn(resolve);
    thread::sleep(Duration::from_millis(100));
    let second = s.spawn(resolve);
    (first.join().unwrap(), second.join().unwrap())
  });

  assert!(Arc::ptr_eq(&first, &second));
  assert!(first_wired);
  assert!(second_wired);
}

#[test]
fn test_resolution_depth_is_bounded() {
  #[derive(Debug)]
  struct A;
  struct B;
  struct C;

  let mut builder =
    ContainerBuilder::new().with_options(ContainerOptions::default().with_max_depth(2));
  builder.register_factory(|ctx| {
    ctx.resolve::<B>()?;
    Ok(A)
  });
  builder.register_factory(|ctx| {
    ctx.resolve::<C>()?;
    Ok(B)
  });
  builder.register_factory(|_| Ok(C));
  let container = builder.build().unwrap();

  let err = container.resolve::<A>().unwrap_err();
  assert!(matches!(err.kind(), ErrorKind::DepthExceeded(2)));
}
