use fibre_di::{
  interceptor_fn, BoxError, CallResult, ContainerBuilder, Interceptor, InterceptorChain, Invocation,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

trait Calculator: Send + Sync {
  fn add(&self, a: i64, b: i64) -> Result<i64, BoxError>;
  fn divide(&self, a: i64, b: i64) -> Result<i64, BoxError>;
}

struct BasicCalculator;
impl Calculator for BasicCalculator {
  fn add(&self, a: i64, b: i64) -> Result<i64, BoxError> {
    Ok(a + b)
  }

  fn divide(&self, a: i64, b: i64) -> Result<i64, BoxError> {
    a.checked_div(b).ok_or_else(|| "division by zero".into())
  }
}

// A hand-written proxy: every method goes through the chain.
struct CalculatorProxy {
  target: Arc<dyn Calculator>,
  chain: InterceptorChain,
}

impl Calculator for CalculatorProxy {
  fn add(&self, a: i64, b: i64) -> Result<i64, BoxError> {
    self.chain.invoke("add", &[&a, &b], || self.target.add(a, b))?
  }

  fn divide(&self, a: i64, b: i64) -> Result<i64, BoxError> {
    self.chain.invoke("divide", &[&a, &b], || self.target.divide(a, b))?
  }
}

struct Timing;

impl Interceptor for Timing {
  fn intercept(&self, invocation: &Invocation<'_>) -> CallResult {
    let started = Instant::now();
    let result = invocation.proceed();
    info!(method = invocation.method(), elapsed = ?started.elapsed(), "call finished");
    result
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut builder = ContainerBuilder::new();
  builder.register_instance(Timing);
  builder
    .register_factory(|_| Ok(BasicCalculator))
    .as_service::<dyn Calculator>(|c| c as Arc<dyn Calculator>)
    .singleton()
    .enable_interception::<dyn Calculator>(|target, chain| {
      Arc::new(CalculatorProxy { target, chain }) as Arc<dyn Calculator>
    })
    .intercepted_by::<Timing>();

  // Applied to every intercepted registration, outside its own interceptors.
  builder.add_interceptor(interceptor_fn(|invocation: &Invocation<'_>| {
    println!("-> {}{:?}", invocation.method(), invocation.arguments());
    let result = invocation.proceed();
    println!("<- {}", invocation.method());
    result
  }));

  let container = builder.build().expect("container configuration is valid");
  let calculator = container.resolve::<dyn Calculator>().expect("calculator resolves");

  println!("2 + 3 = {}", calculator.add(2, 3).expect("addition works"));
  match calculator.divide(1, 0) {
    Ok(value) => println!("1 / 0 = {}", value),
    Err(err) => println!("1 / 0 failed: {}", err),
  }
}
