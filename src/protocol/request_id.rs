use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Correlation identifier used to match a reply to its request.
///
/// Carried in-band as the envelope `id` field (an unsigned 64-bit value).
/// Unique among the outstanding calls of the client that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    // ---
    pub const fn new(id: u64) -> Self {
        // ---
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        // ---
        self.0
    }
}

impl fmt::Display for RequestId {
    // ---
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    // ---
    fn from(id: u64) -> Self {
        // ---
        Self(id)
    }
}

/// Per-client monotonically increasing request ID counter.
///
/// Read-then-increment happens under a single mutex; that is the only
/// critical section on the client's call path.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    // ---
    next: Mutex<u64>,
}

impl RequestIdGenerator {
    // ---
    /// A generator whose first ID is 0.
    pub fn new() -> Self {
        // ---
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        // ---
        Self {
            next: Mutex::new(first),
        }
    }

    /// Assign the next ID.
    pub fn next_id(&self) -> RequestId {
        // ---
        let mut next = lock_ignore_poison(&self.next);
        let id = *next;
        *next = next.wrapping_add(1);
        RequestId(id)
    }

    /// The ID the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> RequestId {
        // ---
        RequestId(*lock_ignore_poison(&self.next))
    }
}

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a plain counter with no invariant that a panic
/// mid-update could break.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_ids_increase() {
        // ---
        let ids = RequestIdGenerator::new();
        assert_eq!(ids.next_id(), RequestId::new(0));
        assert_eq!(ids.next_id(), RequestId::new(1));
        assert_eq!(ids.peek(), RequestId::new(2));
    }

    #[test]
    fn test_concurrent_ids_are_distinct() {
        // ---
        let ids = Arc::new(RequestIdGenerator::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                thread::spawn(move || {
                    let taken: Vec<RequestId> = (0..500).map(|_| ids.next_id()).collect();
                    taken
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            let taken = worker.join().unwrap();
            // Issuance order within one thread is strictly increasing.
            assert!(taken.windows(2).all(|w| w[0] < w[1]));
            for id in taken {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }

        assert_eq!(seen.len(), 8 * 500);
        assert_eq!(ids.peek(), RequestId::new(4000));
    }

    #[test]
    fn test_display() {
        // ---
        assert_eq!(RequestId::from(7).to_string(), "7");
    }
}
