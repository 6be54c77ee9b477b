use fibre_di::{BoxError, ContainerBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// 1. The service
trait Repository: Send + Sync {
  fn find(&self, id: u32) -> Result<String, BoxError>;
}

struct DatabaseRepository;
impl Repository for DatabaseRepository {
  fn find(&self, id: u32) -> Result<String, BoxError> {
    println!("  (database lookup for {})", id);
    Ok(format!("record-{}", id))
  }
}

// 2. Decorators: other implementations of the same service wrapping an inner one
struct Retrying {
  inner: Arc<dyn Repository>,
  attempts: usize,
}
impl Repository for Retrying {
  fn find(&self, id: u32) -> Result<String, BoxError> {
    let mut last = None;
    for _ in 0..self.attempts {
      match self.inner.find(id) {
        Ok(found) => return Ok(found),
        Err(err) => last = Some(err),
      }
    }
    Err(last.unwrap_or_else(|| "no attempts configured".into()))
  }
}

struct Counting {
  inner: Arc<dyn Repository>,
  calls: AtomicUsize,
}
impl Repository for Counting {
  fn find(&self, id: u32) -> Result<String, BoxError> {
    let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
    println!("  call #{}", call);
    self.inner.find(id)
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut builder = ContainerBuilder::new();
  builder.register_instance(3usize).named("retry_attempts");

  // The real implementation is registered under a name...
  builder
    .register_factory(|_| Ok(DatabaseRepository))
    .as_named_service::<dyn Repository>("database", |r| r as Arc<dyn Repository>)
    .singleton();

  // ...and the unnamed service is a decorator around it.
  builder.register_decorator::<dyn Repository, _>("database", |inner, ctx| {
    let attempts = ctx.resolve_named::<usize>("retry_attempts")?;
    Ok(Arc::new(Retrying {
      inner,
      attempts: *attempts,
    }) as Arc<dyn Repository>)
  });

  // Container-level decorators apply to every unnamed `dyn Repository`.
  builder.add_decorator::<dyn Repository, _>(|inner, _| {
    Ok(Arc::new(Counting {
      inner,
      calls: AtomicUsize::new(0),
    }) as Arc<dyn Repository>)
  });

  let container = builder.build().expect("container configuration is valid");
  let repository = container.resolve::<dyn Repository>().expect("repository resolves");

  for id in [7, 8] {
    println!("find({}) = {}", id, repository.find(id).expect("lookup succeeds"));
  }
}
