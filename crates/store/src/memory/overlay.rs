use std::collections::HashMap;
use std::hash::Hash;

/// Keyed writes staged on top of a committed table.
///
/// `None` marks a staged delete.
#[derive(Debug)]
pub(crate) struct Overlay<K, V> {
    staged: HashMap<K, Option<V>>,
}

impl<K, V> Default for Overlay<K, V> {
    fn default() -> Self {
        Self {
            staged: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, V: Clone> Overlay<K, V> {
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn get(&self, key: &K, committed: &HashMap<K, V>) -> Option<V> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => committed.get(key).cloned(),
        }
    }

    pub fn contains(&self, key: &K, committed: &HashMap<K, V>) -> bool {
        match self.staged.get(key) {
            Some(staged) => staged.is_some(),
            None => committed.contains_key(key),
        }
    }

    pub fn put(&mut self, key: K, value: V) {
        self.staged.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: K) {
        self.staged.insert(key, None);
    }

    /// Every visible row: committed rows not shadowed, then staged rows.
    pub fn values(&self, committed: &HashMap<K, V>) -> Vec<V> {
        let mut rows: Vec<V> = committed
            .iter()
            .filter(|(key, _)| !self.staged.contains_key(key))
            .map(|(_, value)| value.clone())
            .collect();
        rows.extend(self.staged.values().flatten().cloned());
        rows
    }

    pub fn apply(self, committed: &mut HashMap<K, V>) {
        for (key, value) in self.staged {
            match value {
                Some(value) => {
                    committed.insert(key, value);
                }
                None => {
                    committed.remove(&key);
                }
            }
        }
    }
}
