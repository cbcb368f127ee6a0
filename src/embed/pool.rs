//! Worker pool handle injected into embedding calls.

use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::{Result, WatermarkError};

/// A fixed set of OS worker threads, or none at all.
///
/// A pool of size 0 runs every work unit inline on the calling thread. The
/// threads of a sized pool are created once and reused by every call that
/// borrows the pool.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl WorkerPool {
    /// A pool that runs everything on the caller's thread.
    pub fn inline() -> Self {
        Self {
            pool: None,
            workers: 0,
        }
    }

    /// A pool of `workers` threads; 0 is the same as [`WorkerPool::inline`].
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Ok(Self::inline());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("refmark-worker-{i}"))
            .build()?;
        Ok(Self {
            pool: Some(pool),
            workers,
        })
    }

    /// Number of worker threads; 0 means inline execution.
    pub fn size(&self) -> usize {
        self.workers
    }

    /// Runs `work` over every task and joins them all before returning.
    ///
    /// The first failing task, including one that panics, fails the whole call
    /// with its error.
    pub(crate) fn run<T, F>(&self, tasks: Vec<T>, work: F) -> Result<()>
    where
        T: Send,
        F: Fn(T) -> Result<()> + Sync + Send,
    {
        let guarded = |task: T| {
            catch_unwind(AssertUnwindSafe(|| work(task)))
                .unwrap_or_else(|payload| Err(WatermarkError::WorkerFailed(panic_message(payload))))
        };

        match &self.pool {
            None => tasks.into_iter().try_for_each(guarded),
            Some(pool) => pool.install(|| tasks.into_par_iter().try_for_each(guarded)),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::inline()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inline_pool_runs_everything() {
        let pool = WorkerPool::inline();
        assert_eq!(pool.size(), 0);

        let count = AtomicUsize::new(0);
        pool.run((0..10).collect(), |_: i32| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_zero_workers_is_inline() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 0);
        assert!(pool.pool.is_none());
    }

    #[test]
    fn test_sized_pool_reuses_its_threads() {
        let pool = WorkerPool::new(3).unwrap();
        let names = Mutex::new(HashSet::new());

        for _ in 0..20 {
            pool.run((0..6).collect(), |_: u32| {
                let name = std::thread::current().name().map(str::to_string);
                names.lock().unwrap().insert(name);
                Ok(())
            })
            .unwrap();
        }

        let names = names.into_inner().unwrap();
        assert!(names.len() <= 3, "saw threads {:?}", names);
        assert!(
            names
                .iter()
                .all(|n| n.as_deref().is_some_and(|n| n.starts_with("refmark-worker-")))
        );
    }

    #[test]
    fn test_task_error_propagates() {
        let pool = WorkerPool::new(2).unwrap();
        let result = pool.run((0..8).collect(), |i: u32| {
            if i == 5 {
                Err(WatermarkError::WorkerFailed("task 5".into()))
            } else {
                Ok(())
            }
        });
        assert_eq!(
            result.unwrap_err(),
            WatermarkError::WorkerFailed("task 5".into())
        );
    }

    #[test]
    fn test_task_panic_becomes_error() {
        for pool in [WorkerPool::inline(), WorkerPool::new(2).unwrap()] {
            let result = pool.run(vec![1u32, 2, 3], |i| {
                if i == 2 {
                    panic!("boom");
                }
                Ok(())
            });
            assert_eq!(result.unwrap_err(), WatermarkError::WorkerFailed("boom".into()));
        }
    }
}
