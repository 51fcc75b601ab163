//! Critical section shared by foreground calls and the engine tick.
//!
//! Holding the section masks the tick: the engine takes the same section
//! before it reads any multi-field entity, so it observes either the whole
//! prior value or the whole new one. Keep scopes short and never call back
//! into the link from inside `with`.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Value reachable only inside a scoped critical section.
pub struct CriticalSection<T> {
    inner: Mutex<T>,
}

impl<T> CriticalSection<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access to the guarded value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // Scopes only ever assign whole values, so a poisoned lock still
        // guards consistent data.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<T: Default> Default for CriticalSection<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for CriticalSection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriticalSection").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Default)]
    struct Pair {
        a: u32,
        b: u32,
    }

    #[test]
    fn test_multi_field_writes_are_atomic() {
        let section = Arc::new(CriticalSection::new(Pair::default()));
        let writer = {
            let section = Arc::clone(&section);
            thread::spawn(move || {
                for i in 0..10_000 {
                    section.with(|p| {
                        p.a = i;
                        p.b = i;
                    });
                }
            })
        };
        for _ in 0..10_000 {
            section.with(|p| assert_eq!(p.a, p.b));
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_survives_poisoning() {
        let section = Arc::new(CriticalSection::new(1u32));
        let poisoner = Arc::clone(&section);
        let _ = thread::spawn(move || poisoner.with(|_| panic!("boom"))).join();
        assert_eq!(section.with(|v| *v), 1);
    }
}
