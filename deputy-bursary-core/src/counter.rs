//! Named per-key accumulators with grand totals.
//!
//! Totals only ever grow: removing a key drops its per-key data but leaves
//! the totals alone.

use std::hash::Hash;

use indexmap::IndexMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CounterDesc {
    title: String,
    initial: u64,
    increment: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterTotal {
    pub id: String,
    pub title: String,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct Counter<K> {
    counters: IndexMap<String, CounterDesc>,
    data: IndexMap<K, IndexMap<String, u64>>,
    total: IndexMap<String, u64>,
}

impl<K> Default for Counter<K> {
    fn default() -> Self {
        Self {
            counters: IndexMap::new(),
            data: IndexMap::new(),
            total: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> Counter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register accumulator `id`, starting at 0 and stepping by 1.
    pub fn add_counter(&mut self, id: &str, title: &str) -> &mut Self {
        self.add_counter_with(id, title, 0, 1)
    }

    pub fn add_counter_with(&mut self, id: &str, title: &str, initial: u64, increment: u64) -> &mut Self {
        self.counters.insert(
            id.to_string(),
            CounterDesc {
                title: title.to_string(),
                initial,
                increment,
            },
        );
        self.total.insert(id.to_string(), initial);
        self
    }

    /// Step `id` for `key` by its registered increment.
    pub fn count(&mut self, key: K, id: &str) {
        match self.counters.get(id) {
            Some(desc) => {
                let increment = desc.increment;
                self.count_by(key, id, increment);
            }
            None => warn!(counter = id, "Ignoring count for unregistered counter"),
        }
    }

    pub fn count_by(&mut self, key: K, id: &str, increment: u64) {
        if !self.counters.contains_key(id) {
            warn!(counter = id, "Ignoring count for unregistered counter");
            return;
        }
        let counters = &self.counters;
        let entry = self.data.entry(key).or_insert_with(|| {
            counters
                .iter()
                .map(|(c, desc)| (c.clone(), desc.initial))
                .collect()
        });
        *entry.entry(id.to_string()).or_insert(0) += increment;
        *self.total.entry(id.to_string()).or_insert(0) += increment;
    }

    /// All accumulators for `key`, or `None` if it was never counted.
    pub fn get(&self, key: &K) -> Option<&IndexMap<String, u64>> {
        self.data.get(key)
    }

    /// One accumulator for `key`; zero when the key or id is unknown.
    pub fn get_count(&self, key: &K, id: &str) -> u64 {
        self.data
            .get(key)
            .and_then(|counts| counts.get(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self, id: &str) -> u64 {
        self.total.get(id).copied().unwrap_or(0)
    }

    /// Grand totals in registration order.
    pub fn totals(&self) -> Vec<CounterTotal> {
        self.counters
            .iter()
            .map(|(id, desc)| CounterTotal {
                id: id.clone(),
                title: desc.title.clone(),
                count: self.total(id),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.data.keys()
    }

    /// Drop per-key data. Totals are not reduced.
    pub fn remove(&mut self, key: &K) -> Option<IndexMap<String, u64>> {
        self.data.shift_remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_counter() -> Counter<i64> {
        let mut counter = Counter::new();
        counter
            .add_counter("rostered", "Rosters Rostered")
            .add_counter("completed", "Rosters Completed");
        counter
    }

    #[test]
    fn keys_accumulate_independently() {
        let mut counter = roster_counter();
        counter.count(1, "rostered");
        counter.count(1, "rostered");
        counter.count(2, "rostered");
        counter.count(2, "completed");

        assert_eq!(counter.get_count(&1, "rostered"), 2);
        assert_eq!(counter.get_count(&1, "completed"), 0);
        assert_eq!(counter.get_count(&2, "completed"), 1);
        assert_eq!(counter.total("rostered"), 3);
        assert_eq!(counter.len(), 2);
    }

    #[test]
    fn totals_never_decrease() {
        let mut counter = roster_counter();
        let mut last = 0;
        for (key, step) in [(1, 1), (2, 3), (1, 2), (3, 1)] {
            counter.count_by(key, "rostered", step);
            let now = counter.total("rostered");
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 7);
    }

    #[test]
    fn removing_a_key_keeps_totals() {
        let mut counter = roster_counter();
        counter.count(1, "rostered");
        counter.count(2, "rostered");

        assert!(counter.remove(&1).is_some());

        assert!(!counter.contains(&1));
        assert_eq!(counter.total("rostered"), 2);
        let totals = counter.totals();
        assert_eq!(totals[0].id, "rostered");
        assert_eq!(totals[0].title, "Rosters Rostered");
        assert_eq!(totals[0].count, 2);
    }

    #[test]
    fn initial_and_increment_are_honoured() {
        let mut counter: Counter<&str> = Counter::new();
        counter.add_counter_with("shifts", "Shifts", 10, 5);
        counter.count("a", "shifts");

        assert_eq!(counter.get_count(&"a", "shifts"), 15);
        assert_eq!(counter.total("shifts"), 15);
    }

    #[test]
    fn unregistered_counter_is_ignored() {
        let mut counter = roster_counter();
        counter.count(1, "bogus");
        assert!(counter.is_empty());
        assert_eq!(counter.total("bogus"), 0);
    }
}
