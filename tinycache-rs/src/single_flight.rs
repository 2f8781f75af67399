//! Deduplicates concurrent calls for the same key.
//!
//! When many requests miss the cache for the same key at the same time, only
//! the first one actually executes the expensive load. All others attach to
//! the in-flight call and receive the very same result (or error) once it
//! completes. Sequential calls are NOT memoized - once a flight has landed,
//! the next call for the key starts a fresh one.
//!
//! The load itself is executed on the runtime via its own task, so a caller
//! which gives up (its future is dropped) never cancels the flight for the
//! other waiters.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::Notify;

use crate::error::CacheError;
use crate::spawn;
use crate::view::ByteView;

/// The in-flight record for one key.
///
/// The result is published exactly once, before the barrier is released;
/// after that the record is read only. Waiters keep the record alive via
/// their own **Arc** even after it has been dropped from the call table.
struct Call {
    done: Notify,
    result: OnceLock<Result<ByteView, CacheError>>,
}

/// Coalesces concurrent calls per key.
///
/// # Examples
/// ```
/// # use tinycache::single_flight::SingleFlight;
/// # use tinycache::view::ByteView;
/// # #[tokio::main]
/// # async fn main() {
/// let flights = SingleFlight::new();
///
/// let value = flights
///     .run("a-key", || async { Ok(ByteView::from("a-value")) })
///     .await
///     .unwrap();
/// assert_eq!(value, ByteView::from("a-value"));
/// # }
/// ```
#[derive(Default)]
pub struct SingleFlight {
    calls: Arc<Mutex<HashMap<String, Arc<Call>>>>,
}

impl SingleFlight {
    /// Creates a new, empty call table.
    pub fn new() -> Self {
        SingleFlight {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Executes **op** for the given key, unless a call for this key is
    /// already in flight - in which case the result of that call is awaited
    /// and returned instead.
    ///
    /// The operation runs with no internal locks held. Its result (success or
    /// error alike) is delivered to every caller which attached to the
    /// flight.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> Result<ByteView, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ByteView, CacheError>> + Send + 'static,
    {
        let (call, leads) = {
            let mut calls = self.calls.lock().unwrap();
            match calls.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let call = Arc::new(Call {
                        done: Notify::new(),
                        result: OnceLock::new(),
                    });
                    let _ = calls.insert(key.to_owned(), call.clone());
                    (call, true)
                }
            }
        };

        // The operation is started outside of the table lock. Callers racing
        // in between simply find the record and attach to it.
        if leads {
            self.launch(key.to_owned(), call.clone(), op());
        }

        // Register interest in the barrier BEFORE checking for a published
        // result, otherwise a release between check and await would be lost.
        let released = call.done.notified();
        tokio::pin!(released);
        released.as_mut().enable();

        if let Some(result) = call.result.get() {
            return result.clone();
        }

        released.await;

        match call.result.get() {
            Some(result) => result.clone(),
            None => unreachable!("A flight released its barrier without publishing a result!"),
        }
    }

    /// Runs the operation as its own task: publish the result, drop the
    /// record from the table, then release the barrier.
    ///
    /// Dropping the record before the release guarantees that callers waking
    /// up later start a fresh flight, while waiters already holding the
    /// record still observe the published result.
    fn launch<Fut>(&self, key: String, call: Arc<Call>, op: Fut)
    where
        Fut: Future<Output = Result<ByteView, CacheError>> + Send + 'static,
    {
        let calls = self.calls.clone();
        spawn!(async move {
            let result = op.await;
            let _ = call.result.set(result);
            let _ = calls.lock().unwrap().remove(&key);
            call.done.notify_waiters();
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CacheError;
    use crate::single_flight::SingleFlight;
    use crate::testing::test_async;
    use crate::view::ByteView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn concurrent_calls_share_one_execution() {
        test_async(async {
            let flights = Arc::new(SingleFlight::new());
            let executions = Arc::new(AtomicUsize::new(0));

            let mut waiters = Vec::new();
            for _ in 0..16 {
                let flights = flights.clone();
                let executions = executions.clone();
                waiters.push(tokio::spawn(async move {
                    flights
                        .run("key", move || async move {
                            let _ = executions.fetch_add(1, Ordering::SeqCst);
                            // Keep the flight open long enough for every
                            // caller to attach to it...
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(ByteView::from("value"))
                        })
                        .await
                }));
            }

            for waiter in waiters {
                assert_eq!(waiter.await.unwrap().unwrap(), ByteView::from("value"));
            }
            assert_eq!(executions.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn errors_are_shared_by_all_waiters() {
        test_async(async {
            let flights = Arc::new(SingleFlight::new());

            let mut waiters = Vec::new();
            for _ in 0..8 {
                let flights = flights.clone();
                waiters.push(tokio::spawn(async move {
                    flights
                        .run("key", || async {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Err(CacheError::Origin("db is down".to_owned()))
                        })
                        .await
                }));
            }

            for waiter in waiters {
                assert_eq!(
                    waiter.await.unwrap(),
                    Err(CacheError::Origin("db is down".to_owned()))
                );
            }
        });
    }

    #[test]
    fn sequential_calls_are_not_memoized() {
        test_async(async {
            let flights = SingleFlight::new();
            let executions = Arc::new(AtomicUsize::new(0));

            for _ in 0..3 {
                let executions = executions.clone();
                let result = flights
                    .run("key", move || async move {
                        let _ = executions.fetch_add(1, Ordering::SeqCst);
                        Ok(ByteView::from("value"))
                    })
                    .await;
                assert_eq!(result.unwrap(), ByteView::from("value"));
            }

            assert_eq!(executions.load(Ordering::SeqCst), 3);
        });
    }

    #[test]
    fn independent_keys_do_not_coalesce() {
        test_async(async {
            let flights = SingleFlight::new();
            let executions = Arc::new(AtomicUsize::new(0));

            for key in ["a", "b"] {
                let executions = executions.clone();
                let result = flights
                    .run(key, move || async move {
                        let _ = executions.fetch_add(1, Ordering::SeqCst);
                        Ok(ByteView::from(key))
                    })
                    .await;
                assert_eq!(result.unwrap(), ByteView::from(key));
            }

            assert_eq!(executions.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn a_cancelled_caller_does_not_cancel_the_flight() {
        test_async(async {
            let flights = Arc::new(SingleFlight::new());
            let executions = Arc::new(AtomicUsize::new(0));

            // The first caller starts the flight and is dropped right away...
            let leader = {
                let flights = flights.clone();
                let executions = executions.clone();
                tokio::spawn(async move {
                    flights
                        .run("key", move || async move {
                            tokio::time::sleep(Duration::from_millis(250)).await;
                            let _ = executions.fetch_add(1, Ordering::SeqCst);
                            Ok(ByteView::from("value"))
                        })
                        .await
                })
            };
            tokio::time::sleep(Duration::from_millis(10)).await;
            leader.abort();

            // ...while a second caller attaches to the very same flight and
            // still receives its result.
            let result = flights
                .run("key", || async {
                    unreachable!("The flight was already in progress!")
                })
                .await;

            assert_eq!(result.unwrap(), ByteView::from("value"));
            assert_eq!(executions.load(Ordering::SeqCst), 1);
        });
    }
}
