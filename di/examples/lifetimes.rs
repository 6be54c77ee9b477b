use fibre_di::{BoxError, Component, ContainerBuilder, Dispose, ResolutionContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id() -> usize {
  NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// Shared by the whole application.
struct Configuration {
  database_url: String,
}

// One per request scope.
struct DbConnection {
  id: usize,
  config: Arc<Configuration>,
}

impl Component for DbConnection {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(DbConnection {
      id: next_id(),
      config: ctx.resolve()?,
    })
  }
}

impl Dispose for DbConnection {
  fn dispose(&self) {
    println!("  closing connection #{} to {}", self.id, self.config.database_url);
  }
}

// A fresh one every time it is requested.
struct QueryBuilder {
  id: usize,
  connection: Arc<DbConnection>,
}

impl Component for QueryBuilder {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
    Ok(QueryBuilder {
      id: next_id(),
      connection: ctx.resolve()?,
    })
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  // --- Registration ---
  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(|_| {
      Ok(Configuration {
        database_url: "postgres://localhost/app".to_string(),
      })
    })
    .singleton();
  builder.register_type::<DbConnection>().scoped().disposable();
  builder.register_type::<QueryBuilder>().transient();
  let container = builder.build().expect("container configuration is valid");

  // --- Two requests, each in its own scope ---
  for request in 1..=2 {
    println!("request {}:", request);
    let scope = container.create_child();

    let q1 = scope.resolve::<QueryBuilder>().expect("query builder resolves");
    let q2 = scope.resolve::<QueryBuilder>().expect("query builder resolves");

    println!(
      "  query builders #{} and #{} share connection #{}",
      q1.id, q2.id, q1.connection.id
    );
    assert!(Arc::ptr_eq(&q1.connection, &q2.connection));
    assert_ne!(q1.id, q2.id);

    scope.dispose().expect("request scope has no live children");
  }

  container.dispose().expect("root disposes cleanly");
}
