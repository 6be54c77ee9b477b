//! Traits implemented by user types so the container can build, wire and
//! release them.

use crate::core::BoxError;
use crate::error::ResolutionError;
use crate::resolver::ResolutionContext;

use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type the container can construct on its own.
///
/// `construct` receives the resolution context and resolves constructor
/// dependencies from it, in the order it asks for them.
///
/// ```
/// use fibre_di::{BoxError, Component, ResolutionContext};
/// use std::sync::Arc;
///
/// struct Clock;
/// impl Component for Clock {
///   fn construct(_: &ResolutionContext<'_>) -> Result<Self, BoxError> {
///     Ok(Clock)
///   }
/// }
///
/// struct Scheduler {
///   clock: Arc<Clock>,
/// }
/// impl Component for Scheduler {
///   fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError> {
///     Ok(Scheduler { clock: ctx.resolve()? })
///   }
/// }
/// ```
pub trait Component: Sized + Send + Sync + 'static {
  fn construct(ctx: &ResolutionContext<'_>) -> Result<Self, BoxError>;
}

/// Settable dependencies wired after the instance is cache-visible.
///
/// Used together with [`Property`] to break cycles that constructors cannot.
pub trait PropertyInjection: Send + Sync + 'static {
  fn inject_properties(&self, ctx: &ResolutionContext<'_>) -> Result<(), BoxError>;
}

/// A release contract run by the owning scope when it is disposed.
pub trait Dispose: Send + Sync + 'static {
  fn dispose(&self);
}

/// A dependency slot filled after construction.
///
/// The slot can be set once. It holds a strong reference, so two shared
/// components pointing at each other keep each other alive.
pub struct Property<T: ?Sized> {
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Default for Property<T> {
  fn default() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }
}

impl<T: ?Sized + Any + Send + Sync> Property<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self) -> Option<Arc<T>> {
    self.cell.get().cloned()
  }

  pub fn is_set(&self) -> bool {
    self.cell.get().is_some()
  }

  /// Sets the value. Returns `false` if the property was already set.
  pub fn set(&self, value: Arc<T>) -> bool {
    self.cell.set(value).is_ok()
  }

  /// Resolves the dependency from `ctx` unless the property is already set.
  pub fn inject(&self, ctx: &ResolutionContext<'_>) -> Result<(), ResolutionError> {
    if !self.is_set() {
      let _ = self.cell.set(ctx.resolve::<T>()?);
    }
    Ok(())
  }

  pub fn inject_named(&self, ctx: &ResolutionContext<'_>, name: &str) -> Result<(), ResolutionError> {
    if !self.is_set() {
      let _ = self.cell.set(ctx.resolve_named::<T>(name)?);
    }
    Ok(())
  }
}

impl<T: ?Sized> fmt::Debug for Property<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Property")
      .field("type", &std::any::type_name::<T>())
      .field("set", &self.cell.get().is_some())
      .finish()
  }
}
