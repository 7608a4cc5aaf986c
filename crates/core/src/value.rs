use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

/// Boxed `Send` future used by producers, step functions and test thunks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type ProducerFn<T> = dyn Fn() -> BoxFuture<T> + Send + Sync;

/// A definition field that is either a literal value or a zero-argument
/// producer evaluated every time the definition is processed.
///
/// Suite files can only express literals; producers come from definitions
/// built in Rust (URLs computed from earlier state, generated bodies, tokens
/// fetched lazily).
pub enum Resolvable<T> {
    Literal(T),
    Producer(Arc<ProducerFn<T>>),
}

impl<T> Resolvable<T>
where
    T: Clone + Send + 'static,
{
    /// Wrap an async producer.
    pub fn producer<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::Producer(Arc::new(move || -> BoxFuture<T> { Box::pin(f()) }))
    }

    /// Wrap a synchronous producer.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(move || -> BoxFuture<T> {
            let value = f();
            Box::pin(async move { value })
        }))
    }

    /// Produce the concrete value, invoking the producer if there is one.
    pub async fn resolve(&self) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Producer(produce) => produce().await,
        }
    }

    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Producer(_) => None,
        }
    }

    pub fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_))
    }
}

impl<T: Clone> Clone for Resolvable<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Producer(produce) => Self::Producer(Arc::clone(produce)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl<T> From<T> for Resolvable<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Resolvable<String> {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl<'de, T> Deserialize<'de> for Resolvable<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::Literal)
    }
}

/// JavaScript-style truthiness of a JSON value.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
