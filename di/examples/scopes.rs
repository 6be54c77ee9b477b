use fibre_di::{ContainerBuilder, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Transaction {
  id: usize,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fibre_di=debug")))
    .init();

  let counter = Arc::new(AtomicUsize::new(0));
  let next = counter.clone();

  let mut builder = ContainerBuilder::new();
  builder
    .register_factory(move |_| {
      Ok(Transaction {
        id: next.fetch_add(1, Ordering::SeqCst) + 1,
      })
    })
    .per_matching_scope("transaction")
    .on_release(|tx| println!("committing transaction {}", tx.id));
  let container = builder.build().expect("container configuration is valid");

  // Everything below the tagged scope shares its transaction.
  let transaction = container.create_tagged_child("transaction");
  let repository_scope = transaction.create_child();
  let audit_scope = transaction.create_child();

  let a = repository_scope.resolve::<Transaction>().expect("transaction resolves");
  let b = audit_scope.resolve::<Transaction>().expect("transaction resolves");
  println!("repository and audit both use transaction {}", a.id);
  assert!(Arc::ptr_eq(&a, &b));

  // Outside of any tagged scope there is nothing to attach to.
  match container.create_child().resolve::<Transaction>() {
    Err(err) if matches!(err.kind(), ErrorKind::NoMatchingScope { .. }) => {
      println!("outside a transaction: {}", err)
    }
    Err(err) => panic!("unexpected error: {}", err),
    Ok(_) => panic!("resolved a transaction outside of a transaction scope"),
  }

  // Disposing the parent first is refused while children are alive.
  if let Err(err) = transaction.dispose() {
    println!("{}", err);
  }
  transaction
    .dispose_cascade()
    .expect("cascading disposal releases every child first");
}
