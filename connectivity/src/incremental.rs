use pcb_common::db::indices::ItemId;
use std::collections::BTreeMap;

/// Pending effect of an item between recomputes. Repeated marks coalesce to
/// the single net effect, so interactive editors can mark freely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pending {
    Added,
    Moved,
    Removed,
}

/// Items touched since the last recompute. Cleared by every completed
/// `recalculate` call, whatever the outcome of the recompute itself.
#[derive(Default)]
pub struct DirtySet {
    // BTreeMap so drains come out in handle order; recomputes stay
    // deterministic regardless of marking order.
    pending: BTreeMap<ItemId, Pending>,
}

impl DirtySet {
    pub fn mark_added(&mut self, item: ItemId) {
        let next = match self.pending.get(&item) {
            // Remove then add is a geometry change of the same handle.
            Some(Pending::Removed) => Pending::Moved,
            Some(&existing) => existing,
            None => Pending::Added,
        };
        self.pending.insert(item, next);
    }

    pub fn mark_moved(&mut self, item: ItemId) {
        let next = match self.pending.get(&item) {
            // A not-yet-seen addition stays an addition wherever it ends up.
            Some(Pending::Added) => Pending::Added,
            // Moving something already marked removed changes nothing.
            Some(Pending::Removed) => Pending::Removed,
            _ => Pending::Moved,
        };
        self.pending.insert(item, next);
    }

    pub fn mark_removed(&mut self, item: ItemId) {
        match self.pending.get(&item) {
            // Add then remove before a recompute is a net no-op.
            Some(Pending::Added) => {
                self.pending.remove(&item);
            }
            _ => {
                self.pending.insert(item, Pending::Removed);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn take(&mut self) -> Vec<(ItemId, Pending)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_cancels_out() {
        let mut dirty = DirtySet::default();
        let id = ItemId::new(1);
        dirty.mark_added(id);
        dirty.mark_removed(id);
        assert!(dirty.is_empty());
    }

    #[test]
    fn moves_coalesce() {
        let mut dirty = DirtySet::default();
        let id = ItemId::new(2);
        dirty.mark_moved(id);
        dirty.mark_moved(id);
        dirty.mark_moved(id);
        assert_eq!(dirty.take(), vec![(id, Pending::Moved)]);
    }

    #[test]
    fn add_survives_subsequent_moves() {
        let mut dirty = DirtySet::default();
        let id = ItemId::new(3);
        dirty.mark_added(id);
        dirty.mark_moved(id);
        assert_eq!(dirty.take(), vec![(id, Pending::Added)]);
    }

    #[test]
    fn remove_then_add_becomes_move() {
        let mut dirty = DirtySet::default();
        let id = ItemId::new(4);
        dirty.mark_removed(id);
        dirty.mark_added(id);
        assert_eq!(dirty.take(), vec![(id, Pending::Moved)]);
    }

    #[test]
    fn remove_wins_over_move() {
        let mut dirty = DirtySet::default();
        let id = ItemId::new(5);
        dirty.mark_moved(id);
        dirty.mark_removed(id);
        dirty.mark_moved(id);
        assert_eq!(dirty.take(), vec![(id, Pending::Removed)]);
    }

    #[test]
    fn drains_in_handle_order() {
        let mut dirty = DirtySet::default();
        dirty.mark_added(ItemId::new(9));
        dirty.mark_added(ItemId::new(1));
        dirty.mark_added(ItemId::new(5));
        let order: Vec<_> = dirty.take().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![ItemId::new(1), ItemId::new(5), ItemId::new(9)]);
    }
}
