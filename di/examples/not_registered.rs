use fibre_di::{resolve, BoxError, Component, ContainerBuilder, ResolutionContext};
use std::panic;

struct UnregisteredService;

struct ReportService;

impl Component for ReportService {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    ctx.resolve::<UnregisteredService>()?;
    Ok(ReportService)
  }
}

fn main() {
  let mut builder = ContainerBuilder::new();
  builder.register_type::<ReportService>();
  let container = builder.build().expect("container configuration is valid");

  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a service that was never registered...");
  let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
    let _service = resolve!(container, UnregisteredService);
  }));
  assert!(result.is_err(), "resolve! should have panicked.");
  println!("Successfully caught the expected panic from resolve!.");

  // --- Using the fallible API ---
  match container.try_resolve::<UnregisteredService>() {
    Ok(None) => println!("Correctly received `None` for the missing service."),
    Ok(Some(_)) => panic!("Should not have found the service!"),
    Err(err) => panic!("unexpected error: {}", err),
  }

  // --- A missing dependency deeper in the graph ---
  match container.resolve::<ReportService>() {
    Ok(_) => panic!("ReportService needs a service that does not exist"),
    Err(err) => {
      println!("\n{}", err);
      println!("resolution path has {} keys", err.chain().len());
    }
  }
}
