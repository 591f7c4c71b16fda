//! Head-keyed single-flight cache.
//!
//! A `HeadCache` remembers one value, computed for one chain head. Asking for
//! the head it holds returns the stored value; asking for any other head
//! starts exactly one production for that head, and every caller that
//! arrives while it runs waits for the same outcome. Failures reach all
//! waiters of the flight but are never stored.
//!
//! Productions run on their own tokio task, so a caller that stops waiting
//! does not cancel work other callers depend on. When a newer head is
//! requested while an older flight runs, the older result is still handed
//! to its own waiters but is not installed.

use crate::error::{MnError, Result};
use crate::hash::Hash;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::debug;

type Outcome<T> = Option<Result<Arc<T>>>;

enum Slot<T> {
    Empty,
    Pending {
        head: Hash,
        flight: u64,
        outcome: watch::Receiver<Outcome<T>>,
    },
    Ready {
        head: Hash,
        value: Arc<T>,
    },
}

struct State<T> {
    slot: Slot<T>,
    // id of the most recently started flight
    flights: u64,
}

pub struct HeadCache<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Default for HeadCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HeadCache<T> {
    pub fn new() -> Self {
        HeadCache {
            state: Arc::new(Mutex::new(State {
                slot: Slot::Empty,
                flights: 0,
            })),
        }
    }

    /// Head of the installed value, if any.
    pub async fn cached_head(&self) -> Option<Hash> {
        match self.state.lock().await.slot {
            Slot::Ready { head, .. } => Some(head),
            _ => None,
        }
    }
}

impl<T: Send + Sync + 'static> HeadCache<T> {
    /// Value for `head`, running `producer(head)` if no value for that head
    /// is stored or in flight.
    pub async fn get<F, Fut>(&self, head: Hash, producer: F) -> Result<Arc<T>>
    where
        F: FnOnce(Hash) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (flight, mut outcome) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match &state.slot {
                Slot::Ready { head: cached, value } if *cached == head => {
                    return Ok(value.clone());
                }
                Slot::Pending {
                    head: pending,
                    flight,
                    outcome,
                } if *pending == head => (*flight, outcome.clone()),
                _ => {
                    state.flights += 1;
                    let flight = state.flights;
                    let (sender, receiver) = watch::channel(None);
                    state.slot = Slot::Pending {
                        head,
                        flight,
                        outcome: receiver.clone(),
                    };
                    debug!(%head, flight, "starting production");
                    tokio::spawn(Self::produce(
                        self.state.clone(),
                        head,
                        flight,
                        producer(head),
                        sender,
                    ));
                    (flight, receiver)
                }
            }
        };

        // copy the outcome out so no watch guard lives across the lock below
        let published = outcome
            .wait_for(Option::is_some)
            .await
            .map(|done| (*done).clone());
        match published {
            Ok(Some(result)) => result,
            Ok(None) => Err(MnError::ProductionAborted("empty outcome".to_string())),
            Err(_) => {
                // the producer task died before publishing; let the next call retry
                let mut state = self.state.lock().await;
                if matches!(state.slot, Slot::Pending { flight: f, .. } if f == flight) {
                    state.slot = Slot::Empty;
                }
                Err(MnError::ProductionAborted(format!(
                    "production for head {head} ended without a result"
                )))
            }
        }
    }

    async fn produce<Fut>(
        state: Arc<Mutex<State<T>>>,
        head: Hash,
        flight: u64,
        production: Fut,
        sender: watch::Sender<Outcome<T>>,
    ) where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let result = production.await.map(Arc::new);
        {
            let mut state = state.lock().await;
            let current = matches!(state.slot, Slot::Pending { flight: f, .. } if f == flight);
            if current {
                state.slot = match &result {
                    Ok(value) => Slot::Ready {
                        head,
                        value: value.clone(),
                    },
                    Err(_) => Slot::Empty,
                };
            } else {
                debug!(%head, flight, "discarding result of superseded production");
            }
        }
        // waiters may all be gone, which is fine
        let _ = sender.send(Some(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn exploding(_: Hash) -> Result<u8> {
        panic!("producer bug")
    }

    fn head(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn get_future_is_send() {
        let cache: HeadCache<Vec<u64>> = HeadCache::new();
        let pending = cache.get(head(1), |_| async { Ok::<_, MnError>(vec![1u64]) });
        assert_send(&pending);
    }

    #[tokio::test]
    async fn second_call_for_same_head_is_served_from_cache() {
        let cache = HeadCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get(head(1), move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MnError>(42u64)
                })
                .await
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_head().await, Some(head(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_production() {
        let cache = Arc::new(HeadCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let callers = (0..32).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get(head(7), move |h| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, MnError>(h)
                    })
                    .await
            })
        });
        let results: Vec<Arc<Hash>> = join_all(callers)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 32);
        for result in &results {
            assert!(Arc::ptr_eq(result, &results[0]));
            assert_eq!(**result, head(7));
        }
    }

    #[tokio::test]
    async fn head_change_triggers_one_new_production() {
        let cache = HeadCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let producer = |calls: Arc<AtomicUsize>| {
            move |h: Hash| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, MnError>(h.as_bytes()[0])
            }
        };

        assert_eq!(*cache.get(head(1), producer(calls.clone())).await.unwrap(), 1);
        assert_eq!(*cache.get(head(2), producer(calls.clone())).await.unwrap(), 2);
        assert_eq!(*cache.get(head(2), producer(calls.clone())).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = HeadCache::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let calls = calls.clone();
            cache
                .get(head(3), move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(MnError::Unavailable("registry down".to_string()))
                })
                .await
        };
        assert_eq!(first, Err(MnError::Unavailable("registry down".to_string())));
        assert_eq!(cache.cached_head().await, None);

        let second = {
            let calls = calls.clone();
            cache
                .get(head(3), move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MnError>(5)
                })
                .await
        };
        assert_eq!(*second.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_reaches_every_waiter() {
        let cache = Arc::new(HeadCache::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let callers = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get(head(4), move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(MnError::Unavailable("boom".to_string()))
                    })
                    .await
            }
        });
        let results = join_all(callers).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| *r == Err(MnError::Unavailable("boom".to_string()))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn superseded_production_is_not_installed() {
        let cache = Arc::new(HeadCache::<u8>::new());
        let (release, gate) = oneshot::channel::<()>();

        let old = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get(head(1), move |_| async move {
                        let _ = gate.await;
                        Ok::<_, MnError>(1)
                    })
                    .await
            })
        };
        // make sure the old flight owns the slot before the head moves on
        while cache.state.lock().await.flights == 0 {
            tokio::task::yield_now().await;
        }

        let new = cache.get(head(2), |_| async { Ok::<_, MnError>(2) }).await.unwrap();
        assert_eq!(*new, 2);

        release.send(()).unwrap();
        // the old flight still answers its own waiter
        assert_eq!(*old.await.unwrap().unwrap(), 1);
        // but the newer head stays installed
        assert_eq!(cache.cached_head().await, Some(head(2)));
        let calls = Arc::new(AtomicUsize::new(0));
        let again = {
            let calls = calls.clone();
            cache
                .get(head(2), move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MnError>(99)
                })
                .await
                .unwrap()
        };
        assert_eq!(*again, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_producer_is_retried() {
        let cache = HeadCache::<u8>::new();
        let aborted = cache.get(head(5), exploding).await;
        assert!(matches!(aborted, Err(MnError::ProductionAborted(_))));

        let value = cache.get(head(5), |_| async { Ok::<_, MnError>(8) }).await.unwrap();
        assert_eq!(*value, 8);
    }
}
