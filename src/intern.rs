use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Concurrent string interner.
///
/// Spec invariant: "Names are interned: repeated strings share storage."
/// Implemented with a `Mutex`-guarded `HashSet` rather than a lock-free
/// concurrent map — nothing in the retrieved example pack reaches for a
/// concurrent-map crate (`dashmap`, `evmap`, ...), so a plain mutex is the
/// idiom this corpus actually uses for "guarded shared state" (see
/// `nova-classpath`'s own `persist.rs`, which guards its caches the same
/// way).
#[derive(Default)]
pub struct Interner {
    table: Mutex<HashSet<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning the shared handle. Equal strings interned
    /// concurrently from different workers collapse to the same `Arc`.
    pub fn intern(&self, value: &str) -> Arc<str> {
        let mut table = self.table.lock().expect("interner mutex poisoned");
        if let Some(existing) = table.get(value) {
            return existing.clone();
        }
        let arc: Arc<str> = Arc::from(value);
        table.insert(arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.table.lock().expect("interner mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
