//! One-shot settle cell.
//!
//! [`OnceSettle`] is the sending half of a result channel that accepts exactly
//! one value. It can be cloned and moved into asynchronous continuations; the
//! first clone to call [`OnceSettle::settle`] wins and every later attempt is
//! rejected, even when attempts race from different tasks.
//!
//! # Example
//!
//! ```
//! use tessera_core::settle::once_settle;
//!
//! # tokio_test::block_on(async {
//! let (cell, settlement) = once_settle::<u32>();
//! let racer = cell.clone();
//!
//! assert!(cell.settle(1).is_ok());
//! assert_eq!(racer.settle(2), Err(2));
//! drop((cell, racer));
//!
//! assert_eq!(settlement.wait().await, Some(1));
//! # });
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Creates a connected settle cell and settlement.
#[must_use]
pub fn once_settle<T>() -> (OnceSettle<T>, Settlement<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        OnceSettle {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        Settlement { receiver },
    )
}

/// Sending half of a one-shot result channel.
#[derive(Debug)]
pub struct OnceSettle<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for OnceSettle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> OnceSettle<T> {
    /// Settles the cell with `value`.
    ///
    /// Returns the value back when the cell was already settled. A settle
    /// whose [`Settlement`] has been dropped still consumes the cell.
    pub fn settle(&self, value: T) -> Result<(), T> {
        let sender = self.sender.lock().take();
        match sender {
            Some(sender) => {
                sender.send(value).ok();
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Returns `true` once a value has been accepted.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Receiving half of a one-shot result channel.
#[derive(Debug)]
pub struct Settlement<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Settlement<T> {
    /// Waits for the settled value.
    ///
    /// Returns `None` if every [`OnceSettle`] clone was dropped without
    /// settling.
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_settle_wins() {
        let (cell, settlement) = once_settle();
        assert!(!cell.is_settled());
        assert!(cell.settle("first").is_ok());
        assert!(cell.is_settled());
        assert_eq!(cell.settle("second"), Err("second"));
        assert_eq!(settlement.wait().await, Some("first"));
    }

    #[tokio::test]
    async fn test_settle_from_later_continuation() {
        let (cell, settlement) = once_settle();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cell.settle(7).is_ok()
        });
        assert_eq!(settlement.wait().await, Some(7));
        assert!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_without_settle() {
        let (cell, settlement) = once_settle::<u8>();
        drop(cell);
        assert_eq!(settlement.wait().await, None);
    }

    #[test]
    fn test_settle_after_settlement_dropped() {
        let (cell, settlement) = once_settle();
        drop(settlement);
        assert!(cell.settle(1).is_ok());
        assert!(cell.is_settled());
        assert_eq!(cell.settle(2), Err(2));
    }

    #[tokio::test]
    async fn test_concurrent_settles_accept_one() {
        let (cell, settlement) = once_settle();
        let handles: Vec<_> = (0..16)
            .map(|n| {
                let cell = cell.clone();
                tokio::spawn(async move { cell.settle(n).is_ok() })
            })
            .collect();
        drop(cell);

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert!(settlement.wait().await.is_some());
    }
}
