#![forbid(unsafe_code)]

//! Item → view table with lazily enabled duplicate counting.
//!
//! Most collections never hold the same item twice, so reference counts are
//! only allocated on the first duplicate. From then on every entry has a
//! count, keeping `entries` and `ref_counts` the same size.

use ahash::AHashMap;

use pmint_core::{ObjectId, ObjectRef};

use crate::view::ViewHandle;

/// One materialized item.
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) item: ObjectRef,
    pub(crate) view: ViewHandle,
}

#[derive(Default)]
pub(crate) struct ViewTable {
    entries: AHashMap<ObjectId, Entry>,
    ref_counts: Option<AHashMap<ObjectId, usize>>,
}

impl ViewTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn view(&self, id: ObjectId) -> Option<ViewHandle> {
        self.entries.get(&id).map(|e| e.view.clone())
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }

    /// Record a freshly created view.
    pub(crate) fn insert(&mut self, item: ObjectRef, view: ViewHandle) {
        let id = ObjectId::of(&*item);
        if let Some(counts) = self.ref_counts.as_mut() {
            counts.insert(id, 1);
        }
        self.entries.insert(id, Entry { item, view });
    }

    /// Count one more occurrence of an item that already has a view.
    pub(crate) fn retain(&mut self, id: ObjectId) {
        let entries = &self.entries;
        let counts = self
            .ref_counts
            .get_or_insert_with(|| entries.keys().map(|&k| (k, 1)).collect());
        *counts.entry(id).or_insert(0) += 1;
    }

    /// Drop one occurrence. Returns the entry once its last occurrence goes.
    pub(crate) fn release(&mut self, id: ObjectId) -> Option<Entry> {
        if let Some(counts) = self.ref_counts.as_mut() {
            let count = counts.get_mut(&id)?;
            *count -= 1;
            if *count > 0 {
                return None;
            }
            counts.remove(&id);
        }
        self.entries.remove(&id)
    }

    /// Remove every entry regardless of counts.
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        if let Some(counts) = self.ref_counts.as_mut() {
            counts.clear();
        }
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    /// Occurrences of an item: 0 when absent, 1 when counts are not tracked.
    pub(crate) fn ref_count(&self, id: ObjectId) -> usize {
        if !self.entries.contains_key(&id) {
            return 0;
        }
        self.ref_counts
            .as_ref()
            .and_then(|counts| counts.get(&id).copied())
            .unwrap_or(1)
    }

    #[cfg(test)]
    pub(crate) fn is_counting(&self) -> bool {
        self.ref_counts.is_some()
    }

    #[cfg(test)]
    pub(crate) fn counts_len(&self) -> Option<usize> {
        self.ref_counts.as_ref().map(|counts| counts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use pmint_core::Bindable;

    use crate::context::DataContext;
    use crate::view::View;

    struct Item;
    impl Bindable for Item {}

    struct Blank;
    impl View for Blank {
        fn data_context(&self) -> Option<Rc<DataContext>> {
            None
        }
        fn set_sibling_index(&self, _: usize) {}
    }

    fn item() -> ObjectRef {
        Rc::new(Item)
    }

    #[test]
    fn counts_start_lazily_and_cover_every_entry() {
        let mut table = ViewTable::default();
        let a = item();
        let b = item();
        table.insert(a.clone(), Rc::new(Blank));
        table.insert(b.clone(), Rc::new(Blank));
        assert!(!table.is_counting());

        table.retain(ObjectId::of(&*a));
        assert!(table.is_counting());
        assert_eq!(table.counts_len(), Some(2));
        assert_eq!(table.ref_count(ObjectId::of(&*a)), 2);
        assert_eq!(table.ref_count(ObjectId::of(&*b)), 1);

        let c = item();
        table.insert(c.clone(), Rc::new(Blank));
        assert_eq!(table.counts_len(), Some(3));
    }

    #[test]
    fn release_removes_on_last_occurrence() {
        let mut table = ViewTable::default();
        let a = item();
        let id = ObjectId::of(&*a);
        table.insert(a, Rc::new(Blank));
        table.retain(id);

        assert!(table.release(id).is_none());
        assert_eq!(table.ref_count(id), 1);
        assert!(table.release(id).is_some());
        assert_eq!(table.len(), 0);
        assert_eq!(table.counts_len(), Some(0));
        assert!(table.release(id).is_none());
    }

    #[test]
    fn drain_ignores_counts() {
        let mut table = ViewTable::default();
        let a = item();
        table.insert(a.clone(), Rc::new(Blank));
        table.retain(ObjectId::of(&*a));
        assert_eq!(table.drain().len(), 1);
        assert_eq!(table.len(), 0);
        assert_eq!(table.counts_len(), Some(0));
    }
}
