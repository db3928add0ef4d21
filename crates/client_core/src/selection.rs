use std::collections::BTreeMap;

/// Ids chosen for attachment, order irrelevant.
///
/// Adds are counted, so removing an id undoes exactly one add: an add followed
/// by a remove of the same id always restores the previous contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet<T: Ord> {
    counts: BTreeMap<T, usize>,
}

impl<T: Ord> Default for SelectionSet<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> SelectionSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the id was not selected before.
    pub fn add(&mut self, id: T) -> bool {
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when the id is no longer selected afterwards.
    pub fn remove(&mut self, id: &T) -> bool {
        let Some(count) = self.counts.get_mut(id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &T) -> bool {
        self.counts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.counts.keys()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.counts.keys().cloned().collect()
    }
}

impl<T: Ord + Clone> FromIterator<T> for SelectionSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}
