//! # Bounded Task Scope
//!
//! A [`TaskScope`] runs independently submitted tasks with at most `bound`
//! of them in flight (`0` means no bound). It is structured: every task
//! submitted through a [`Section`] has finished by the time
//! [`TaskScope::run`] returns, so no background work outlives the call
//! site, and tasks may borrow from the caller's stack.
//!
//! ## Failure policy
//!
//! Scopes fail together rather than fast. A failing task never cancels its
//! siblings; failures are collected while the remaining tasks keep running
//! and are surfaced once the scope has drained, collapsed into a single
//! error with [`Error::from_failures`].
//!
//! ## Backpressure
//!
//! With a non-zero bound, [`Section::execute`] blocks the submitting thread
//! while `bound` tasks are in flight and resumes as soon as one finishes.
//! Slots are released by a guard, so a panicking task still frees its slot.
//!
//! ## Example
//!
//! ```
//! use package_mirror::scope::TaskScope;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let done = AtomicUsize::new(0);
//! TaskScope::new(2)
//!     .run(|section| {
//!         for _ in 0..5 {
//!             section.execute(|| {
//!                 done.fetch_add(1, Ordering::SeqCst);
//!                 Ok(())
//!             });
//!         }
//!     })
//!     .unwrap();
//! assert_eq!(done.load(Ordering::SeqCst), 5);
//! ```

use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Default bound for coarse-grained scopes, such as one task per repository.
///
/// Follows the size of the global rayon pool, which honours
/// `RAYON_NUM_THREADS` and otherwise matches the number of CPUs.
pub fn default_bound() -> usize {
    rayon::current_num_threads()
}

/// A bounded-parallelism, fail-together task execution boundary
#[derive(Debug, Clone, Copy)]
pub struct TaskScope {
    bound: usize,
}

impl TaskScope {
    /// Creates a scope running at most `bound` tasks at once (`0` = unbounded).
    pub fn new(bound: usize) -> Self {
        Self { bound }
    }

    /// Creates a scope bounded by [`default_bound`].
    pub fn with_default_bound() -> Self {
        Self::new(default_bound())
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Runs `body`, which submits tasks through the given [`Section`].
    ///
    /// Returns once every submitted task has finished. If any task failed,
    /// the collected failures are returned instead of the body's value.
    pub fn run<'env, F, R>(&self, body: F) -> Result<R>
    where
        F: for<'scope> FnOnce(&Section<'scope, 'env>) -> R,
    {
        let state = Arc::new(ScopeState::new(self.bound));

        let value = thread::scope(|scope| {
            let section = Section {
                scope,
                state: Arc::clone(&state),
            };
            body(&section)
        });

        let failures = std::mem::take(&mut *state.failures.lock());
        debug!(
            "task scope drained: {} submitted, {} failed",
            *state.submitted.lock(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(value)
        } else {
            Err(Error::from_failures(failures))
        }
    }
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::with_default_bound()
    }
}

/// Submission handle passed to the body of [`TaskScope::run`]
pub struct Section<'scope, 'env: 'scope> {
    scope: &'scope thread::Scope<'scope, 'env>,
    state: Arc<ScopeState>,
}

impl<'scope, 'env> Section<'scope, 'env> {
    /// Enqueues `task` for execution.
    ///
    /// Blocks only while the scope's bound is saturated. The task's error,
    /// if any, is recorded and surfaced when the scope exits.
    pub fn execute<T>(&self, task: T)
    where
        T: FnOnce() -> Result<()> + Send + 'scope,
    {
        let permit = Permit::acquire(Arc::clone(&self.state));
        self.scope.spawn(move || {
            if let Err(e) = task() {
                debug!("task failed: {}", e);
                permit.state.failures.lock().push(e);
            }
            drop(permit);
        });
    }

    /// Number of tasks currently running in this scope.
    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock()
    }
}

struct ScopeState {
    bound: usize,
    in_flight: Mutex<usize>,
    slot_freed: Condvar,
    submitted: Mutex<usize>,
    failures: Mutex<Vec<Error>>,
}

impl ScopeState {
    fn new(bound: usize) -> Self {
        Self {
            bound,
            in_flight: Mutex::new(0),
            slot_freed: Condvar::new(),
            submitted: Mutex::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }
}

/// An in-flight slot, released on drop
struct Permit {
    state: Arc<ScopeState>,
}

impl Permit {
    fn acquire(state: Arc<ScopeState>) -> Self {
        {
            let mut in_flight = state.in_flight.lock();
            while state.bound > 0 && *in_flight >= state.bound {
                state.slot_freed.wait(&mut in_flight);
            }
            *in_flight += 1;
        }
        *state.submitted.lock() += 1;
        Self { state }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut in_flight = self.state.in_flight.lock();
        *in_flight -= 1;
        self.state.slot_freed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn failing(n: usize) -> Error {
        Error::Transport {
            url: format!("http://host/{}", n),
            message: "unreachable".to_string(),
        }
    }

    #[test]
    fn test_all_tasks_complete_before_exit() {
        let done = AtomicUsize::new(0);
        TaskScope::new(3)
            .run(|section| {
                for _ in 0..20 {
                    section.execute(|| {
                        thread::sleep(Duration::from_millis(2));
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                }
            })
            .unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_bound_limits_in_flight_tasks() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        TaskScope::new(2)
            .run(|section| {
                for _ in 0..10 {
                    section.execute(|| {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    });
                }
            })
            .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_zero_bound_runs_every_task_concurrently() {
        // Each task waits for all others; this only completes if all five
        // run at the same time.
        let barrier = Barrier::new(5);
        TaskScope::new(0)
            .run(|section| {
                for _ in 0..5 {
                    section.execute(|| {
                        barrier.wait();
                        Ok(())
                    });
                }
            })
            .unwrap();
    }

    #[test]
    fn test_failures_surface_after_siblings_finish() {
        let done = AtomicUsize::new(0);
        let result = TaskScope::new(2).run(|section| {
            for n in 0..6 {
                let done = &done;
                section.execute(move || {
                    if n == 1 {
                        return Err(failing(n));
                    }
                    thread::sleep(Duration::from_millis(3));
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
        });

        let error = result.unwrap_err();
        assert!(matches!(error, Error::Transport { .. }));
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_multiple_failures_are_aggregated() {
        let result = TaskScope::new(0).run(|section| {
            for n in 0..4 {
                section.execute(move || if n % 2 == 0 { Err(failing(n)) } else { Ok(()) });
            }
        });

        match result.unwrap_err() {
            Error::Tasks { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_tasks_write_disjoint_borrowed_entries() {
        let mut slots = vec![0usize; 8];
        TaskScope::new(3)
            .run(|section| {
                for (i, slot) in slots.iter_mut().enumerate() {
                    section.execute(move || {
                        *slot = i * 10;
                        Ok(())
                    });
                }
            })
            .unwrap();
        assert_eq!(slots, (0..8).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_body_value_returned_on_success() {
        let value = TaskScope::new(1).run(|section| {
            section.execute(|| Ok(()));
            42
        });
        assert_eq!(value.unwrap(), 42);
    }

    #[test]
    fn test_default_bound_is_positive() {
        assert!(TaskScope::default().bound() >= 1);
    }
}
