use std::fmt;
use std::future::IntoFuture;

use futures_util::future::{self, BoxFuture, Either, Ready};
use futures_util::FutureExt;

/// Result of a call that completes synchronously unless the schema has async steps.
pub enum Resolution<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Resolution<T> {
    pub fn map<U, F>(self, f: F) -> Resolution<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        match self {
            Resolution::Ready(value) => Resolution::Ready(f(value)),
            Resolution::Pending(pending) => Resolution::Pending(pending.map(f).boxed()),
        }
    }
}

impl<T> Resolution<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending(_))
    }

    /// The value, if it did not need to wait on anything.
    pub fn ready(self) -> Option<T> {
        match self {
            Resolution::Ready(value) => Some(value),
            Resolution::Pending(_) => None,
        }
    }
}

impl<T: Send + 'static> IntoFuture for Resolution<T> {
    type Output = T;
    type IntoFuture = Either<Ready<T>, BoxFuture<'static, T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Resolution::Ready(value) => Either::Left(future::ready(value)),
            Resolution::Pending(pending) => Either::Right(pending),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Resolution::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_branches_await() {
        let ready = Resolution::Ready(2).map(|n| n * 10);
        assert!(!ready.is_pending());
        assert_eq!(ready.await, 20);

        let pending = Resolution::Pending(async { 3 }.boxed()).map(|n| n + 1);
        assert!(pending.is_pending());
        assert_eq!(pending.await, 4);
    }

    #[test]
    fn ready_unwraps_only_sync_results() {
        assert_eq!(Resolution::Ready("x").ready(), Some("x"));
        assert_eq!(Resolution::Pending(async { "y" }.boxed()).ready(), None);
    }
}

