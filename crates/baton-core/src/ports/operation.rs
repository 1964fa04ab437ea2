//! Operation port - 型消去された非同期処理
//!
//! # 二層構造
//! - **表層（Typed）**: any `FnOnce() -> impl Future<Output = Result<R, E>>`
//!   with `R: Serialize`, `E: Display`
//! - **内部（Dyn）**: `Operation` trait object producing a JSON value
//!
//! The queue only ever sees `Box<dyn Operation>`, so one queue can carry
//! heterogeneous work (create an assignment, update an asset, ...).

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::ActionFailure;

/// A zero-argument async unit of work, consumed exactly once.
#[async_trait]
pub trait Operation: Send {
    async fn run(self: Box<Self>) -> Result<serde_json::Value, ActionFailure>;
}

/// Adapts a typed closure into an `Operation`.
pub struct FnOperation<F, Fut, R, E> {
    f: F,
    _marker: PhantomData<fn() -> (Fut, R, E)>,
}

impl<F, Fut, R, E> FnOperation<F, Fut, R, E> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, R, E> Operation for FnOperation<F, Fut, R, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    async fn run(self: Box<Self>) -> Result<serde_json::Value, ActionFailure> {
        let this = *self;
        let value = (this.f)()
            .await
            .map_err(|e| ActionFailure::new(e.to_string()))?;
        serde_json::to_value(value)
            .map_err(|e| ActionFailure::new(format!("could not encode result: {e}")))
    }
}

/// Box a typed closure as a `dyn Operation`.
pub fn boxed<F, Fut, R, E>(f: F) -> Box<dyn Operation>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    Box::new(FnOperation::new(f))
}
