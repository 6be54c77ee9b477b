use fibre_di::{BoxError, Component, ContainerBuilder, Property, PropertyInjection, ResolutionContext};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// --- A constructor cycle cannot be built ---

struct Chicken;
impl Component for Chicken {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<Egg>()?;
    Ok(Chicken)
  }
}

struct Egg;
impl Component for Egg {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<Chicken>()?;
    Ok(Egg)
  }
}

// --- A property cycle between shared components can ---

#[derive(Default)]
struct Department {
  manager: Property<Employee>,
}

impl Component for Department {
  fn construct(_: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(Department::default())
  }
}

impl PropertyInjection for Department {
  fn inject_properties(&self, ctx: &ResolutionContext<'_>) -> Result<(), BoxError> {
    Ok(self.manager.inject(ctx)?)
  }
}

#[derive(Default)]
struct Employee {
  department: Property<Department>,
}

impl Component for Employee {
  fn construct(_: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(Employee::default())
  }
}

impl PropertyInjection for Employee {
  fn inject_properties(&self, ctx: &ResolutionContext<'_>) -> Result<(), BoxError> {
    Ok(self.department.inject(ctx)?)
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fibre_di=debug")))
    .init();

  let mut builder = ContainerBuilder::new();
  builder.register_type::<Chicken>();
  builder.register_type::<Egg>();
  builder.register_type::<Department>().singleton().properties_autowired();
  builder.register_type::<Employee>().singleton().properties_autowired();
  let container = builder.build().expect("container configuration is valid");

  match container.resolve::<Chicken>() {
    Ok(_) => panic!("a constructor cycle was resolved"),
    Err(err) => println!("{}", err),
  }

  let department = container.resolve::<Department>().expect("property cycle closes");
  let manager = department.manager.get().expect("manager is wired");
  let back = manager.department.get().expect("department is wired");
  println!(
    "manager points back at its department: {}",
    Arc::ptr_eq(&department, &back)
  );
}
