use fibre_di::{ConcreteTypeSource, ContainerBuilder, DelegatingSource, Lifetime, ServiceKey};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct SystemClock;

impl SystemClock {
  fn now(&self) -> &'static str {
    "2024-01-01T00:00:00Z"
  }
}

trait Command: Send + Sync {
  fn run(&self) -> String;
}

struct Save;
impl Command for Save {
  fn run(&self) -> String {
    "saved".to_string()
  }
}

struct Quit;
impl Command for Quit {
  fn run(&self) -> String {
    "bye".to_string()
  }
}

trait MenuItem: Send + Sync {
  fn label(&self) -> String;
}

struct CommandMenuItem(Arc<dyn Command>);
impl MenuItem for CommandMenuItem {
  fn label(&self) -> String {
    format!("[{}]", self.0.run())
  }
}

struct ReportFactory {
  clock: Arc<SystemClock>,
}

impl ReportFactory {
  fn daily(&self) -> String {
    format!("daily report at {}", self.clock.now())
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fibre_di=debug")))
    .init();

  let mut builder = ContainerBuilder::new();

  // Types nobody registered, built on demand.
  builder.register_source(
    ConcreteTypeSource::new()
      .with_default::<SystemClock>()
      .with_lifetime(Lifetime::Singleton),
  );

  // Values produced by a factory service.
  builder.register_factory(|ctx| Ok(ReportFactory { clock: ctx.resolve()? }));
  builder.register_source(
    DelegatingSource::<ReportFactory>::new().dispatch::<String, _>(|factory| Ok(factory.daily())),
  );

  // One menu item for every command, carrying the command's metadata.
  builder
    .register_factory(|_| Ok(Save))
    .as_service::<dyn Command>(|c| c as Arc<dyn Command>)
    .with_metadata("key", "s");
  builder
    .register_factory(|_| Ok(Quit))
    .as_service::<dyn Command>(|c| c as Arc<dyn Command>)
    .with_metadata("key", "q");
  builder.register_adapter::<dyn Command, dyn MenuItem>(|command| {
    Arc::new(CommandMenuItem(command)) as Arc<dyn MenuItem>
  });

  let container = builder.build().expect("container configuration is valid");

  println!("{}", container.resolve::<String>().expect("report resolves"));

  for item in container.resolve_all::<dyn MenuItem>().expect("menu resolves") {
    println!("menu item {}", item.label());
  }

  let quit = ServiceKey::of::<dyn MenuItem>().with_metadata("key", "q");
  let item = container
    .resolve_key::<dyn MenuItem>(&quit)
    .expect("quit item resolves");
  println!("pressing q: {}", item.label());
}
