use crate::Result;
use crate::runtime::tokio;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type Hook = Box<dyn FnOnce() + Send>;

/// Runs its hook at most once, on `cancel` or on drop.
struct Canceller {
    hook: Mutex<Option<Hook>>,
}

impl Canceller {
    fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            hook: Mutex::new(Some(Box::new(hook))),
        }
    }

    fn cancel(&self) {
        let hook = self
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for Canceller {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Live sequence of states pushed by the store.
///
/// Delivery continues until [`Subscription::cancel`] is called or the value
/// is dropped; cancelling more than once is a no-op.
pub struct Subscription<T> {
    stream: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
    canceller: Canceller,
}

impl<T: Send + 'static> Subscription<T> {
    pub fn new(
        stream: impl Stream<Item = Result<T>> + Send + 'static,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            stream: Box::pin(stream),
            canceller: Canceller::new(on_cancel),
        }
    }

    pub fn from_receiver(
        rx: mpsc::UnboundedReceiver<Result<T>>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::new(UnboundedReceiverStream::new(rx), on_cancel)
    }

    /// A subscription whose only item is `error`.
    pub fn failed(error: crate::Error) -> Self {
        Self::new(futures::stream::once(async move { Err(error) }), || {})
    }

    pub fn map<U, F>(self, mut f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        Subscription {
            stream: Box::pin(self.stream.map(move |item| item.and_then(&mut f))),
            canceller: self.canceller,
        }
    }

    /// Calls `f` with every error item before passing it on.
    pub fn inspect_err<F>(self, mut f: F) -> Self
    where
        F: FnMut(&crate::Error) + Send + 'static,
    {
        Subscription {
            stream: Box::pin(self.stream.inspect(move |item| {
                if let Err(error) = item {
                    f(error);
                }
            })),
            canceller: self.canceller,
        }
    }
}

impl<T> Subscription<T> {
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.canceller.is_cancelled()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.canceller.is_cancelled() {
            return Poll::Ready(None);
        }

        self.stream.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn cancel_runs_hook_once_and_ends_stream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel::<Result<u32>>();

        let counter = calls.clone();
        let mut subscription = Subscription::from_receiver(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(Ok(1)).unwrap();
        assert_eq!(subscription.next().await.unwrap().unwrap(), 1);

        subscription.cancel();
        subscription.cancel();
        tx.send(Ok(2)).unwrap();

        assert!(subscription.next().await.is_none());
        drop(subscription);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mapped_subscription_keeps_cancel_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel::<Result<u32>>();

        let counter = calls.clone();
        let mut doubled = Subscription::from_receiver(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .map(|n| Ok(n * 2));

        tx.send(Ok(21)).unwrap();
        assert_eq!(doubled.next().await.unwrap().unwrap(), 42);

        drop(doubled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
