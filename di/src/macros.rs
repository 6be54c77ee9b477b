//! Public macros for ergonomic service resolution.

/// Resolves a required service from a container, scope or resolution
/// context, panicking if it cannot be resolved.
///
/// There is no global container: the first argument is whatever you resolve
/// from. For a non-panicking version call `resolve` on it directly.
///
/// # Panics
///
/// Panics with the resolution error if the service cannot be resolved.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, ContainerBuilder};
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(String::from("hello"));
/// builder.register_instance(String::from("bonjour")).named("fr");
/// let container = builder.build().unwrap();
///
/// assert_eq!(*resolve!(container, String), "hello");
/// assert_eq!(*resolve!(container, String, "fr"), "bonjour");
/// ```
///
/// ```
/// use fibre_di::{resolve, ContainerBuilder};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///   fn greet(&self) -> String;
/// }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter {
///   fn greet(&self) -> String {
///     "Hello!".to_string()
///   }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///   .register_factory(|_| Ok(EnglishGreeter))
///   .as_service::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
///   .singleton();
/// let container = builder.build().unwrap();
///
/// let greeter = resolve!(container, trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // resolve!(scope, trait MyTrait)
    ($from:expr, trait $trait_ident:ident) => {
        $from
            .resolve::<dyn $trait_ident>()
            .unwrap_or_else(|err| panic!("Failed to resolve required trait service: {}", err))
    };

    // resolve!(scope, trait MyTrait, "name")
    ($from:expr, trait $trait_ident:ident, $name:expr) => {
        $from
            .resolve_named::<dyn $trait_ident>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service with name '{}': {}",
                    $name, err
                )
            })
    };

    // resolve!(scope, MyService)
    ($from:expr, $type:ty) => {
        $from
            .resolve::<$type>()
            .unwrap_or_else(|err| panic!("Failed to resolve required service: {}", err))
    };

    // resolve!(scope, MyService, "name")
    ($from:expr, $type:ty, $name:expr) => {
        $from
            .resolve_named::<$type>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service with name '{}': {}",
                    $name, err
                )
            })
    };
}

/// Resolves an optional service, returning `None` when nothing provides it.
///
/// # Panics
///
/// Panics if a provider exists but construction fails.
///
/// ```
/// use fibre_di::{maybe_resolve, ContainerBuilder};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// assert!(maybe_resolve!(container, u32).is_none());
/// ```
#[macro_export]
macro_rules! maybe_resolve {
    (@key $from:expr, $type:ty, $key:expr) => {
        $from
            .try_resolve_key::<$type>(&$key)
            .unwrap_or_else(|err| panic!("Failed to resolve optional service: {}", err))
    };

    ($from:expr, trait $trait_ident:ident) => {
        $crate::maybe_resolve!(@key $from, dyn $trait_ident, $crate::ServiceKey::of::<dyn $trait_ident>())
    };

    ($from:expr, trait $trait_ident:ident, $name:expr) => {
        $crate::maybe_resolve!(@key $from, dyn $trait_ident, $crate::ServiceKey::named::<dyn $trait_ident>($name))
    };

    ($from:expr, $type:ty) => {
        $crate::maybe_resolve!(@key $from, $type, $crate::ServiceKey::of::<$type>())
    };

    ($from:expr, $type:ty, $name:expr) => {
        $crate::maybe_resolve!(@key $from, $type, $crate::ServiceKey::named::<$type>($name))
    };
}
