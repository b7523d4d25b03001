//! Dense instance pool - fixed-capacity per-instance attribute storage
//!
//! Backs every flora batcher:
//! - Fixed capacity matching the GPU instance buffer
//! - Live instances packed in `[0, count)` so one draw covers them
//! - Swap-with-last removal keeps the range dense in O(1)
//! - Stable external ids mapped to slots in both directions
//!
//! Every mutation raises a dirty flag. The uploader copies `live()` and
//! clears the flag with [`DenseInstancePool::take_dirty`].

use std::collections::HashMap;

use bytemuck::Pod;

/// Stable external id of a logical flora object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct FoliageId(pub u64);

impl std::fmt::Display for FoliageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-capacity dense array of instance records with an id <-> slot map
pub struct DenseInstancePool<T: Pod> {
    /// Debug name used in log output
    label: &'static str,
    /// Attribute records; only `[0, count)` is meaningful
    attrs: Vec<T>,
    /// slot -> id, same length as the live range
    slot_to_id: Vec<FoliageId>,
    /// id -> slot
    id_to_slot: HashMap<FoliageId, u32>,
    capacity: u32,
    dirty: bool,
    /// Instances dropped because the pool was full
    dropped: u64,
}

impl<T: Pod> DenseInstancePool<T> {
    /// Create an empty pool with room for `capacity` instances
    pub fn new(label: &'static str, capacity: u32) -> Self {
        Self {
            label,
            attrs: Vec::with_capacity(capacity as usize),
            slot_to_id: Vec::with_capacity(capacity as usize),
            id_to_slot: HashMap::with_capacity(capacity as usize),
            capacity,
            dirty: false,
            dropped: 0,
        }
    }

    /// Append an instance at slot `count`.
    ///
    /// Returns the slot, or `None` when the pool is full (the instance is
    /// dropped with a warning). Re-registering a live id rewrites its slot.
    pub fn register(&mut self, id: FoliageId, attrs: T) -> Option<u32> {
        if let Some(&slot) = self.id_to_slot.get(&id) {
            self.attrs[slot as usize] = attrs;
            self.dirty = true;
            return Some(slot);
        }

        if self.count() >= self.capacity {
            self.dropped += 1;
            log::warn!(
                "{} pool full ({} instances), dropping {}",
                self.label,
                self.capacity,
                id
            );
            return None;
        }

        let slot = self.count();
        self.attrs.push(attrs);
        self.slot_to_id.push(id);
        self.id_to_slot.insert(id, slot);
        self.dirty = true;
        Some(slot)
    }

    /// Remove an instance by id, moving the last live instance into its slot.
    ///
    /// Returns false if the id is not live.
    pub fn remove(&mut self, id: FoliageId) -> bool {
        let Some(slot) = self.id_to_slot.remove(&id) else {
            return false;
        };

        let last = self.count() - 1;
        if slot != last {
            let moved_id = self.slot_to_id[last as usize];
            self.attrs.swap(slot as usize, last as usize);
            self.slot_to_id[slot as usize] = moved_id;
            self.id_to_slot.insert(moved_id, slot);
        }

        self.attrs.pop();
        self.slot_to_id.pop();
        self.dirty = true;
        true
    }

    /// Rewrite one live slot. Slots outside `[0, count)` are ignored.
    pub fn update(&mut self, slot: u32, attrs: T) {
        if let Some(dst) = self.attrs.get_mut(slot as usize) {
            *dst = attrs;
            self.dirty = true;
        }
    }

    /// Rewrite the slot of a live id. Returns false if the id is unknown.
    pub fn update_by_id(&mut self, id: FoliageId, attrs: T) -> bool {
        match self.id_to_slot.get(&id) {
            Some(&slot) => {
                self.update(slot, attrs);
                true
            }
            None => false,
        }
    }

    /// Mutate one live slot in place
    pub fn modify(&mut self, slot: u32, f: impl FnOnce(&mut T)) {
        if let Some(dst) = self.attrs.get_mut(slot as usize) {
            f(dst);
            self.dirty = true;
        }
    }

    /// Mutate every live slot, passing the slot's id along
    pub fn for_each_mut(&mut self, mut f: impl FnMut(FoliageId, &mut T)) {
        if self.attrs.is_empty() {
            return;
        }
        for (attrs, &id) in self.attrs.iter_mut().zip(self.slot_to_id.iter()) {
            f(id, attrs);
        }
        self.dirty = true;
    }

    pub fn get(&self, slot: u32) -> Option<&T> {
        self.attrs.get(slot as usize)
    }

    pub fn get_by_id(&self, id: FoliageId) -> Option<&T> {
        self.slot_of(id).and_then(|slot| self.get(slot))
    }

    pub fn slot_of(&self, id: FoliageId) -> Option<u32> {
        self.id_to_slot.get(&id).copied()
    }

    pub fn id_at(&self, slot: u32) -> Option<FoliageId> {
        self.slot_to_id.get(slot as usize).copied()
    }

    pub fn contains(&self, id: FoliageId) -> bool {
        self.id_to_slot.contains_key(&id)
    }

    /// Number of live instances
    pub fn count(&self) -> u32 {
        self.attrs.len() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    /// Instances dropped on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Live attribute records, slot order
    pub fn live(&self) -> &[T] {
        &self.attrs
    }

    /// Mutable live records; marks the pool dirty
    pub fn live_mut(&mut self) -> &mut [T] {
        if !self.attrs.is_empty() {
            self.dirty = true;
        }
        &mut self.attrs
    }

    /// Live records as raw bytes for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.attrs)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the dirty flag and clear it
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Pool utilization percentage
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.count() as f32 / self.capacity as f32 * 100.0
    }

    /// Drop every instance
    pub fn clear(&mut self) {
        if self.attrs.is_empty() {
            return;
        }
        self.attrs.clear();
        self.slot_to_id.clear();
        self.id_to_slot.clear();
        self.dirty = true;
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct TestInstance {
        value: [f32; 4],
    }

    fn inst(v: f32) -> TestInstance {
        TestInstance { value: [v, v * 2.0, v * 3.0, 1.0] }
    }

    /// Bijection check over [0, count)
    fn assert_consistent(pool: &DenseInstancePool<TestInstance>) {
        assert!(pool.count() <= pool.capacity());
        assert_eq!(pool.slot_to_id.len(), pool.attrs.len());
        assert_eq!(pool.id_to_slot.len(), pool.attrs.len());
        for slot in 0..pool.count() {
            let id = pool.id_at(slot).unwrap();
            assert_eq!(pool.slot_of(id), Some(slot));
        }
        for (&id, &slot) in pool.id_to_slot.iter() {
            assert!(slot < pool.count());
            assert_eq!(pool.id_at(slot), Some(id));
        }
    }

    #[test]
    fn test_register_appends() {
        let mut pool = DenseInstancePool::new("test", 4);
        assert_eq!(pool.register(FoliageId(10), inst(1.0)), Some(0));
        assert_eq!(pool.register(FoliageId(11), inst(2.0)), Some(1));
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.get(1), Some(&inst(2.0)));
        assert_consistent(&pool);
    }

    #[test]
    fn test_example_sequence() {
        // capacity 3: A, B, C -> remove B -> register D
        let (a, b, c, d) = (FoliageId(1), FoliageId(2), FoliageId(3), FoliageId(4));
        let mut pool = DenseInstancePool::new("test", 3);
        pool.register(a, inst(1.0));
        pool.register(b, inst(2.0));
        pool.register(c, inst(3.0));

        assert!(pool.remove(b));
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.slot_of(c), Some(1));
        assert_eq!(pool.get(1), Some(&inst(3.0)));
        assert_eq!(pool.get(2), None);

        assert_eq!(pool.register(d, inst(4.0)), Some(2));
        assert_eq!(pool.count(), 3);
        assert_consistent(&pool);
    }

    #[test]
    fn test_remove_preserves_moved_attributes() {
        let mut pool = DenseInstancePool::new("test", 8);
        for i in 0..5 {
            pool.register(FoliageId(i), inst(i as f32));
        }
        let before = *pool.get_by_id(FoliageId(4)).unwrap();
        pool.remove(FoliageId(1));
        let after = *pool.get_by_id(FoliageId(4)).unwrap();
        assert_eq!(before, after);
        assert_eq!(pool.slot_of(FoliageId(4)), Some(1));
        assert_consistent(&pool);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut pool = DenseInstancePool::new("test", 4);
        pool.register(FoliageId(1), inst(1.0));
        pool.register(FoliageId(2), inst(2.0));
        assert!(pool.remove(FoliageId(2)));
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.get(0), Some(&inst(1.0)));
        assert_consistent(&pool);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut pool = DenseInstancePool::new("test", 4);
        pool.register(FoliageId(1), inst(1.0));
        pool.take_dirty();
        assert!(!pool.remove(FoliageId(99)));
        assert_eq!(pool.count(), 1);
        assert!(!pool.is_dirty());
    }

    #[test]
    fn test_overflow_dropped() {
        let mut pool = DenseInstancePool::new("test", 2);
        pool.register(FoliageId(1), inst(1.0));
        pool.register(FoliageId(2), inst(2.0));
        assert_eq!(pool.register(FoliageId(3), inst(3.0)), None);
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.dropped(), 1);
        assert!(!pool.contains(FoliageId(3)));
        assert!(pool.is_full());
        assert_consistent(&pool);
    }

    #[test]
    fn test_zero_capacity() {
        let mut pool: DenseInstancePool<TestInstance> = DenseInstancePool::new("test", 0);
        assert_eq!(pool.register(FoliageId(1), inst(1.0)), None);
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.utilization(), 0.0);
    }

    #[test]
    fn test_reregister_rewrites_slot() {
        let mut pool = DenseInstancePool::new("test", 2);
        pool.register(FoliageId(1), inst(1.0));
        assert_eq!(pool.register(FoliageId(1), inst(5.0)), Some(0));
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.get(0), Some(&inst(5.0)));
    }

    #[test]
    fn test_update_does_not_change_count() {
        let mut pool = DenseInstancePool::new("test", 4);
        pool.register(FoliageId(1), inst(1.0));
        pool.update(0, inst(7.0));
        pool.update(3, inst(9.0)); // beyond count, ignored
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.get(0), Some(&inst(7.0)));
        assert!(pool.update_by_id(FoliageId(1), inst(8.0)));
        assert!(!pool.update_by_id(FoliageId(2), inst(8.0)));
        assert_eq!(pool.get(0), Some(&inst(8.0)));
    }

    #[test]
    fn test_dirty_flag() {
        let mut pool = DenseInstancePool::new("test", 4);
        assert!(!pool.is_dirty());
        pool.register(FoliageId(1), inst(1.0));
        assert!(pool.take_dirty());
        assert!(!pool.take_dirty());
        pool.modify(0, |i| i.value[3] = 0.5);
        assert!(pool.is_dirty());
    }

    #[test]
    fn test_as_bytes_covers_live_range() {
        let mut pool = DenseInstancePool::new("test", 4);
        pool.register(FoliageId(1), inst(1.0));
        pool.register(FoliageId(2), inst(2.0));
        assert_eq!(pool.as_bytes().len(), 2 * std::mem::size_of::<TestInstance>());
    }

    #[test]
    fn test_random_sequence_keeps_bijection() {
        // xorshift so the sequence is deterministic
        let mut state = 0x9E37_79B9u32;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        let mut pool = DenseInstancePool::new("test", 16);
        let mut live: Vec<FoliageId> = Vec::new();
        for step in 0..2000u64 {
            if next() % 3 == 0 && !live.is_empty() {
                let idx = next() as usize % live.len();
                let id = live.swap_remove(idx);
                assert!(pool.remove(id));
            } else {
                let id = FoliageId(step);
                if pool.register(id, inst(step as f32)).is_some() {
                    live.push(id);
                }
            }
            assert_consistent(&pool);
            assert_eq!(pool.count() as usize, live.len());
        }
        for id in &live {
            let slot = pool.slot_of(*id).unwrap();
            assert_eq!(pool.get(slot).unwrap().value[0], id.0 as f32);
        }
    }

    #[test]
    fn test_for_each_mut_and_clear() {
        let mut pool = DenseInstancePool::new("test", 4);
        pool.register(FoliageId(1), inst(1.0));
        pool.register(FoliageId(2), inst(2.0));
        pool.for_each_mut(|id, i| i.value[3] = id.0 as f32);
        assert_eq!(pool.get_by_id(FoliageId(2)).unwrap().value[3], 2.0);
        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.contains(FoliageId(1)));
    }
}
