//! Call interception for proxied services.
//!
//! There is no runtime proxy generation. An intercepted registration supplies
//! a hand-written forwarding type that routes each method through
//! [`InterceptorChain::invoke`]. The first registered interceptor is the
//! outermost one: it sees the call first and the return value last.

use crate::core::BoxError;

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;
use thiserror::Error;

/// A value returned through the interceptor chain.
pub trait CallValue: Any + Send + Debug {
  fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
  fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Debug> CallValue for T {
  fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
    self
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

impl dyn CallValue {
  pub fn is<T: Any>(&self) -> bool {
    self.as_any().is::<T>()
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.as_any().downcast_ref::<T>()
  }
}

pub type ReturnValue = Box<dyn CallValue>;
pub type CallResult = Result<ReturnValue, InvocationError>;

#[derive(Debug, Error)]
pub enum InvocationError {
  #[error("interceptor failed during `{method}`: {source}")]
  Interceptor {
    method: &'static str,
    #[source]
    source: BoxError,
  },

  #[error("interceptor returned the wrong type from `{method}`, expected {expected}")]
  ReturnTypeMismatch {
    method: &'static str,
    expected: &'static str,
  },
}

/// Wraps calls on a proxied service.
pub trait Interceptor: Send + Sync + 'static {
  /// Handles one call. Call [`Invocation::proceed`] to continue down the
  /// chain; returning without it short-circuits the real method.
  fn intercept(&self, invocation: &Invocation<'_>) -> CallResult;
}

/// An [`Interceptor`] built from a closure.
pub struct FnInterceptor<F> {
  f: F,
}

/// Builds an [`Interceptor`] from a closure.
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F>
where
  F: Fn(&Invocation<'_>) -> CallResult + Send + Sync + 'static,
{
  FnInterceptor { f }
}

impl<F> Interceptor for FnInterceptor<F>
where
  F: Fn(&Invocation<'_>) -> CallResult + Send + Sync + 'static,
{
  fn intercept(&self, invocation: &Invocation<'_>) -> CallResult {
    (self.f)(invocation)
  }
}

/// One call travelling through the chain.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
  method: &'static str,
  arguments: &'a [&'a dyn Debug],
  remaining: &'a [Arc<dyn Interceptor>],
  target: &'a dyn Fn() -> ReturnValue,
}

impl<'a> Invocation<'a> {
  pub fn method(&self) -> &'static str {
    self.method
  }

  pub fn arguments(&self) -> &'a [&'a dyn Debug] {
    self.arguments
  }

  /// Runs the next interceptor, or the real method at the end of the chain.
  pub fn proceed(&self) -> CallResult {
    match self.remaining.split_first() {
      Some((next, rest)) => next.intercept(&Invocation {
        remaining: rest,
        ..*self
      }),
      None => Ok((self.target)()),
    }
  }

  /// A short-circuit result carrying `value`.
  pub fn returning<R: CallValue>(value: R) -> CallResult {
    Ok(Box::new(value) as ReturnValue)
  }

  /// Wraps an interceptor failure for this call.
  pub fn fail(&self, error: impl Into<BoxError>) -> InvocationError {
    InvocationError::Interceptor {
      method: self.method,
      source: error.into(),
    }
  }
}

impl Debug for Invocation<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Invocation")
      .field("method", &self.method)
      .field("arguments", &self.arguments)
      .field("remaining", &self.remaining.len())
      .finish()
  }
}

/// The interceptors applied to one proxied instance.
#[derive(Clone)]
pub struct InterceptorChain {
  interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
  pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
    Self {
      interceptors: interceptors.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.interceptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.interceptors.is_empty()
  }

  /// Routes a call through the chain.
  ///
  /// `call` performs the real method. Failures raised by the real method are
  /// part of `R` and come back unchanged.
  pub fn invoke<R>(
    &self,
    method: &'static str,
    arguments: &[&dyn Debug],
    call: impl Fn() -> R,
  ) -> Result<R, InvocationError>
  where
    R: Any + Send + Debug,
  {
    if self.interceptors.is_empty() {
      return Ok(call());
    }

    let target = || -> ReturnValue { Box::new(call()) };
    let invocation = Invocation {
      method,
      arguments,
      remaining: &self.interceptors,
      target: &target,
    };
    let value = invocation.proceed()?;
    value
      .into_any()
      .downcast::<R>()
      .map(|value| *value)
      .map_err(|_| InvocationError::ReturnTypeMismatch {
        method,
        expected: std::any::type_name::<R>(),
      })
  }
}

impl Debug for InterceptorChain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InterceptorChain")
      .field("len", &self.interceptors.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;

  fn shared(interceptor: impl Interceptor) -> Arc<dyn Interceptor> {
    Arc::new(interceptor)
  }

  fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Interceptor> {
    shared(interceptor_fn(move |invocation: &Invocation<'_>| {
      log.lock().push(format!("{} in", name));
      let result = invocation.proceed();
      log.lock().push(format!("{} out", name));
      result
    }))
  }

  #[test]
  fn first_registered_interceptor_is_outermost() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = InterceptorChain::new(vec![
      recorder("a", log.clone()),
      recorder("b", log.clone()),
    ]);

    let sum = chain
      .invoke("add", &[&2, &3], || {
        log.lock().push("call".to_string());
        2 + 3
      })
      .unwrap();

    assert_eq!(sum, 5);
    assert_eq!(*log.lock(), vec!["a in", "b in", "call", "b out", "a out"]);
  }

  #[test]
  fn short_circuit_skips_the_target() {
    let chain = InterceptorChain::new(vec![shared(interceptor_fn(|_: &Invocation<'_>| {
      Invocation::returning(42i32)
    }))]);
    let called = std::sync::atomic::AtomicBool::new(false);

    let value = chain
      .invoke("answer", &[], || {
        called.store(true, std::sync::atomic::Ordering::SeqCst);
        0i32
      })
      .unwrap();

    assert_eq!(value, 42);
    assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
  }

  #[test]
  fn wrong_short_circuit_type_is_reported() {
    let chain = InterceptorChain::new(vec![shared(interceptor_fn(|_: &Invocation<'_>| {
      Invocation::returning("not a number")
    }))]);

    let err = chain.invoke("answer", &[], || 0i32).unwrap_err();
    assert!(matches!(err, InvocationError::ReturnTypeMismatch { method: "answer", .. }));
  }

  #[test]
  fn interceptors_see_arguments_and_may_inspect_results() {
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    let chain = InterceptorChain::new(vec![shared(interceptor_fn(move |invocation: &Invocation<'_>| {
      let result = invocation.proceed()?;
      *sink.lock() = format!(
        "{}({:?}) = {:?}",
        invocation.method(),
        invocation.arguments(),
        result.downcast_ref::<i32>()
      );
      Ok(result)
    }))]);

    chain.invoke("double", &[&21], || 42i32).unwrap();
    assert_eq!(*seen.lock(), "double([21]) = Some(42)");
  }
}
