//! # Fibre DI
//!
//! A scoped, thread-safe dependency resolution runtime for Rust.
//!
//! Components are registered up front on a [`ContainerBuilder`]. The finished
//! [`Container`] resolves them on demand, wiring constructor and property
//! dependencies, sharing instances according to their [`Lifetime`] and
//! releasing them when the owning [`Scope`] is disposed.
//!
//! ## Core Concepts
//!
//! - **Registration**: how to build one implementation, which services it is
//!   exposed as, and how instances are shared. See [`Registration`].
//! - **Scope**: a node in a tree of caches. Scoped instances live in the scope
//!   that built them, singletons in the root, and instances bound to a tag in
//!   the nearest scope carrying it.
//! - **Registration sources**: fallbacks asked for registrations on demand
//!   when the registry has none. See [`RegistrationSource`].
//! - **Decorators and interceptors**: wrappers applied around resolved
//!   services, and call interception through hand-written proxies.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{resolve, BoxError, Component, ContainerBuilder, ResolutionContext};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!   message: Arc<String>,
//! }
//!
//! impl Component for EnglishGreeter {
//!   fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
//!     Ok(EnglishGreeter {
//!       message: ctx.resolve_named("greeting_message")?,
//!     })
//!   }
//! }
//!
//! impl Greeter for EnglishGreeter {
//!   fn greet(&self) -> String {
//!     (*self.message).clone()
//!   }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder
//!   .register_instance(String::from("Hello, World!"))
//!   .named("greeting_message");
//! builder
//!   .register_type::<EnglishGreeter>()
//!   .as_service::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
//!   .singleton();
//! let container = builder.build().unwrap();
//!
//! let greeter = resolve!(container, trait Greeter);
//! assert_eq!(greeter.greet(), "Hello, World!");
//!
//! let request = container.create_child();
//! let same = resolve!(request, trait Greeter);
//! assert!(Arc::ptr_eq(&greeter, &same));
//! ```

mod component;
mod config;
mod container;
mod core;
mod decorator;
mod error;
mod intercept;
mod key;
mod lazy;
mod macros;
mod registration;
mod registry;
mod resolver;
mod scope;
mod source;

pub use component::{Component, Dispose, Property, PropertyInjection};
pub use config::ContainerOptions;
pub use container::{Container, ContainerBuilder};
pub use crate::core::{BoxError, Lifetime, Ownership, RegistrationId};
pub use error::{Error, ErrorKind, KeyChain, ResolutionError, Result};
pub use intercept::{
  interceptor_fn, CallResult, CallValue, FnInterceptor, Interceptor, InterceptorChain, Invocation,
  InvocationError, ReturnValue,
};
pub use key::{MetaValue, Metadata, ServiceKey};
pub use lazy::Lazy;
pub use registration::{Registration, RegistrationBuilder};
pub use registry::Registry;
pub use resolver::ResolutionContext;
pub use scope::{Scope, ScopeId};
pub use source::{AdapterSource, ConcreteTypeSource, DelegatingSource, RegistrationSource};
