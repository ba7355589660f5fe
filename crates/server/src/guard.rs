//! Concurrency Guard: per-session mutual exclusion for state transitions.
//!
//! Tick and input handlers are independent producers. Each must enter the
//! guard before touching session state and drops its mutation if the guard
//! is busy. Nothing is queued.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// Non-blocking exclusive access to a value.
#[derive(Debug)]
pub struct MutationGuard<T> {
    value: Mutex<T>,
    in_flight: AtomicBool,
}

/// Proof of entry. Exits the guard when dropped.
#[derive(Debug)]
pub struct GuardToken<'a, T> {
    value: MutexGuard<'a, T>,
    in_flight: &'a AtomicBool,
}

impl<T> MutationGuard<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Enter if nobody else is mutating.
    pub fn try_enter(&self) -> Option<GuardToken<'_, T>> {
        let value = self.value.try_lock().ok()?;
        Some(self.token(value))
    }

    /// Wait for the current mutation to finish, then enter.
    ///
    /// Only teardown paths wait; transitions always use [`try_enter`](Self::try_enter).
    pub async fn enter(&self) -> GuardToken<'_, T> {
        let value = self.value.lock().await;
        self.token(value)
    }

    /// Whether a mutation currently holds the guard.
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn token<'a>(&'a self, value: MutexGuard<'a, T>) -> GuardToken<'a, T> {
        self.in_flight.store(true, Ordering::Release);
        GuardToken {
            value,
            in_flight: &self.in_flight,
        }
    }
}

impl<T> Deref for GuardToken<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for GuardToken<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for GuardToken<'_, T> {
    fn drop(&mut self) {
        // Cleared before the mutex guard field is dropped.
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_second_entry_is_refused() {
        let guard = MutationGuard::new(0u32);
        let mut first = guard.try_enter().unwrap();
        *first += 1;

        assert!(guard.in_flight());
        assert!(guard.try_enter().is_none());

        drop(first);
        assert!(!guard.in_flight());
        assert_eq!(*guard.try_enter().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enter_waits_for_release() {
        let guard = Arc::new(MutationGuard::new(Vec::<u32>::new()));
        let mut held = guard.try_enter().unwrap();

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let mut token = guard.enter().await;
                token.push(2);
            })
        };
        tokio::task::yield_now().await;
        held.push(1);
        drop(held);

        waiter.await.unwrap();
        assert_eq!(*guard.try_enter().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_contended_entries_never_overlap() {
        let guard = Arc::new(MutationGuard::new(0u64));
        let entered = Arc::new(std::sync::atomic::AtomicU64::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let entered = Arc::clone(&entered);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(mut token) = guard.try_enter() {
                            let seen = *token;
                            std::hint::spin_loop();
                            *token = seen + 1;
                            entered.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(
            *guard.try_enter().unwrap(),
            entered.load(Ordering::Relaxed)
        );
    }
}
