//! Promise abstraction shared by the synchronous and asynchronous adapters.
//!
//! A [`Promise`] is either already fulfilled or a boxed future. The
//! coordinator is written once against this type; the active
//! [`PromiseAdapter`] decides whether pending work is resolved eagerly
//! in-process or handed back to the caller's executor.

use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::{Future, IntoFuture};

/// A value that may not be available yet.
pub enum Promise<T> {
    /// The value is available.
    Fulfilled(T),
    /// The value will be produced by a future.
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Promise<T> {
    /// Creates a fulfilled promise.
    pub fn fulfilled(value: T) -> Self {
        Self::Fulfilled(value)
    }

    /// Wraps a future.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Returns true if the value is not available yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Maps the eventual value.
    pub fn then<U, F>(self, f: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Self::Fulfilled(value) => Promise::Fulfilled(f(value)),
            Self::Pending(fut) => Promise::Pending(fut.map(f).boxed()),
        }
    }

    /// Chains another promise onto the eventual value.
    pub fn and_then<U, F>(self, f: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        match self {
            Self::Fulfilled(value) => f(value),
            Self::Pending(fut) => Promise::Pending(async move { f(fut.await).await }.boxed()),
        }
    }

    /// Returns the value if the promise is fulfilled.
    pub fn into_fulfilled(self) -> Result<T, Self> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            pending => Err(pending),
        }
    }
}

impl<T: Send + 'static> IntoFuture for Promise<T> {
    type Output = T;
    type IntoFuture = BoxFuture<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Fulfilled(value) => future::ready(value).boxed(),
            Self::Pending(fut) => fut,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfilled(value) => f.debug_tuple("Fulfilled").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Decides how pending promises are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromiseAdapter {
    /// Pending work is driven to completion on the calling thread.
    #[default]
    Sync,
    /// Pending work is returned to the caller's executor.
    Async,
}

impl PromiseAdapter {
    /// Creates a fulfilled promise.
    pub fn create_fulfilled<T: Send + 'static>(&self, value: T) -> Promise<T> {
        Promise::fulfilled(value)
    }

    /// Waits for every promise, keeping input order in the output.
    ///
    /// Stays fulfilled when every input is fulfilled.
    pub fn all<T: Send + 'static>(&self, promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        if promises.iter().all(|p| !p.is_pending()) {
            let values = promises
                .into_iter()
                .filter_map(|p| p.into_fulfilled().ok())
                .collect();
            return Promise::Fulfilled(values);
        }
        let futures = promises.into_iter().map(IntoFuture::into_future);
        Promise::Pending(future::join_all(futures).boxed())
    }

    /// Resolves the promise now under the synchronous adapter; returns it
    /// untouched under the asynchronous one.
    ///
    /// The synchronous adapter blocks the current thread, so the engine's
    /// futures must not depend on the caller's reactor.
    pub fn wait<T: Send + 'static>(&self, promise: Promise<T>) -> Promise<T> {
        match (self, promise) {
            (Self::Sync, Promise::Pending(fut)) => Promise::Fulfilled(futures::executor::block_on(fut)),
            (_, promise) => promise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_then_on_fulfilled_is_eager() {
        let p = Promise::fulfilled(2).then(|v| v * 21);
        assert_eq!(p.into_fulfilled().unwrap(), 42);
    }

    #[test]
    fn test_sync_adapter_waits() {
        let p = Promise::from_future(async { "late" }).then(str::len);
        assert!(p.is_pending());

        let waited = PromiseAdapter::Sync.wait(p);
        assert_eq!(waited.into_fulfilled().unwrap(), 4);
    }

    #[test]
    fn test_async_adapter_does_not_wait() {
        let p = Promise::from_future(async { 1 });
        assert!(PromiseAdapter::Async.wait(p).is_pending());
    }

    #[test]
    fn test_all_fulfilled_stays_fulfilled() {
        let adapter = PromiseAdapter::Sync;
        let all = adapter.all(vec![
            adapter.create_fulfilled(1),
            adapter.create_fulfilled(2),
        ]);
        assert_eq!(all.into_fulfilled().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_all_preserves_order() {
        let slow = Promise::from_future(async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            "first"
        });
        let fast = Promise::fulfilled("second");
        let quick = Promise::from_future(async { "third" });

        let all = PromiseAdapter::Async.all(vec![slow, fast, quick]);
        assert!(all.is_pending());
        assert_eq!(all.await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_and_then_chains() {
        let p = Promise::from_future(async { 3 })
            .and_then(|v| Promise::from_future(async move { v + 1 }));
        assert_eq!(p.await, 4);
    }
}
