// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shape store: owns every [`VerticalShape`] produced while decoding a
//! PesTrie index, and the four decoding primitives that populate it.
//!
//! A `VerticalShape` is a contiguous run `[y1, y2]` of pre-order labels,
//! placed at one or more columns. The store hands out stable [`ShapeId`]
//! handles so that [`crate::segment_index::SegmentIndex`] can reference the
//! same physical shape from many columns without cloning it up front —
//! exactly the sharing the copy-on-write coalescing pass in
//! [`crate::segment_index`] is built to preserve.

use std::fmt;

/// Stable handle to a [`VerticalShape`] living in a [`ShapeStore`].
///
/// Generational like [`understory_index::Key`] in spirit, but the store never
/// hands a freed slot back to a live caller within a single load, so a plain
/// index is enough: shapes are only ever freed during coalescing, and the
/// freed slot is never addressed again (no bucket still holds the freed id).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(u32);

impl ShapeId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "index files are bounded well under u32::MAX shapes"
    )]
    fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A contiguous run `[y1, y2]` of pre-order labels, shared across `refcount`
/// column buckets until coalescing either extends it in place or clones it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VerticalShape {
    /// Lower bound (inclusive).
    pub y1: i32,
    /// Upper bound (inclusive). Always `>= y1`.
    pub y2: i32,
    refcount: u32,
}

impl VerticalShape {
    fn new(y1: i32, y2: i32, refcount: u32) -> Self {
        debug_assert!(y1 <= y2, "shape bounds must be ordered: {y1} <= {y2}");
        debug_assert!(refcount >= 1, "a shape must be referenced at least once");
        Self { y1, y2, refcount }
    }

    /// Whether this shape is referenced by more than one column bucket.
    ///
    /// The coalescing pass in [`crate::segment_index`] uses this to decide
    /// whether extending a run in place would corrupt a sibling column still
    /// holding the same [`ShapeId`], in which case it must clone first.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.refcount > 1
    }
}

/// Owns every [`VerticalShape`] allocated while decoding an index.
///
/// Freed slots (refcount dropped to zero during coalescing) are pushed to a
/// free list and reused by later allocations, mirroring the free-list arena
/// pattern `understory_index::IndexGeneric` uses for its entries.
#[derive(Debug, Default)]
pub struct ShapeStore {
    shapes: Vec<Option<VerticalShape>>,
    free_list: Vec<usize>,
}

impl ShapeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shapes: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocates a new shape with the given bounds and reference count.
    pub fn alloc(&mut self, y1: i32, y2: i32, refcount: u32) -> ShapeId {
        let shape = VerticalShape::new(y1, y2, refcount);
        if let Some(idx) = self.free_list.pop() {
            self.shapes[idx] = Some(shape);
            ShapeId::new(idx)
        } else {
            self.shapes.push(Some(shape));
            ShapeId::new(self.shapes.len() - 1)
        }
    }

    /// Returns a reference to the shape behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never allocated by this store or was already
    /// reclaimed — this is a store invariant violation, not a query error.
    #[must_use]
    pub fn get(&self, id: ShapeId) -> &VerticalShape {
        self.shapes[id.idx()]
            .as_ref()
            .expect("shape store invariant violated: id refers to a reclaimed slot")
    }

    /// Decrements `id`'s refcount by one, reclaiming the slot if it reaches
    /// zero. Returns `true` if the shape was reclaimed.
    pub fn release(&mut self, id: ShapeId) -> bool {
        let slot = self.shapes[id.idx()]
            .as_mut()
            .expect("shape store invariant violated: double release");
        debug_assert!(slot.refcount > 0, "refcount underflow on release");
        slot.refcount -= 1;
        if slot.refcount == 0 {
            self.shapes[id.idx()] = None;
            self.free_list.push(id.idx());
            true
        } else {
            false
        }
    }

    /// Clones the shape behind `id` into a fresh slot with refcount 1,
    /// without touching `id`'s own refcount. Used by the coalescing pass's
    /// copy-on-write rule: the caller releases the original separately.
    pub fn clone_shape(&mut self, id: ShapeId) -> ShapeId {
        let shape = *self.get(id);
        self.alloc(shape.y1, shape.y2, 1)
    }

    /// Extends `id`'s upper bound in place. Only valid to call on a shape
    /// the caller knows is not shared (`refcount == 1`) — see
    /// [`VerticalShape::is_shared`].
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `id` is still shared, or if `new_y2` would
    /// move the bound backwards.
    pub fn extend_y2(&mut self, id: ShapeId, new_y2: i32) {
        let slot = self.shapes[id.idx()]
            .as_mut()
            .expect("shape store invariant violated: id refers to a reclaimed slot");
        debug_assert!(
            slot.refcount <= 1,
            "extend_y2 called on a shape still shared by another column"
        );
        debug_assert!(new_y2 >= slot.y2, "extend_y2 must not shrink the bound");
        slot.y2 = new_y2;
    }

    /// Number of live (non-reclaimed) shapes. Exposed for profiling.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.shapes.iter().filter(|s| s.is_some()).count()
    }
}

/// Decoding primitives that translate the binary index's rectangle/line/point
/// stream into shapes pushed onto raw (pre-coalesce) column buckets.
///
/// These are free functions rather than `ShapeStore` methods because they
/// also need to append to the loader's raw column buckets; see
/// [`crate::segment_index::RawColumns`].
pub mod insert {
    use super::ShapeStore;
    use crate::segment_index::RawColumns;

    /// `insert_point(x, y)`: a unit shape `(y, y)` at column `x`, and its
    /// mirror `(x, x)` at column `y`.
    pub fn insert_point(shapes: &mut ShapeStore, columns: &mut RawColumns, x: i32, y: i32) {
        let at_x = shapes.alloc(y, y, 1);
        columns.push(x, at_x);
        let at_y = shapes.alloc(x, x, 1);
        columns.push(y, at_y);
    }

    /// `insert_vertical(x1..x2, y1..y2)`.
    ///
    /// When `x1 == x2` this is a true vertical: one shape `(y1, y2)` at
    /// column `x1`, mirrored as unit shapes `(x1, x1)` shared across every
    /// column in `[y1, y2]`.
    ///
    /// Otherwise this is a rectangle: one shape `(y1, y2)` shared across
    /// every column in `[x1, x2]`, mirrored as one shape `(x1, x2)` shared
    /// across every column in `[y1, y2]`.
    ///
    /// The binary index file's "horizontal" records use this same primitive
    /// (called with `x1 == x2`) — see the loader's `decode_horizontals`.
    pub fn insert_vertical(
        shapes: &mut ShapeStore,
        columns: &mut RawColumns,
        x1: i32,
        x2: i32,
        y1: i32,
        y2: i32,
    ) {
        debug_assert!(x1 <= x2 && y1 <= y2);
        if x1 == x2 {
            let id = shapes.alloc(y1, y2, 1);
            columns.push(x1, id);

            #[allow(
                clippy::cast_sign_loss,
                reason = "y2 >= y1 is a loader invariant, so the span is non-negative"
            )]
            let span = (y2 - y1 + 1) as u32;
            let mirror = shapes.alloc(x1, x1, span);
            for y in y1..=y2 {
                columns.push(y, mirror);
            }
        } else {
            #[allow(
                clippy::cast_sign_loss,
                reason = "x2 >= x1 is a loader invariant, so the span is non-negative"
            )]
            let span = (x2 - x1 + 1) as u32;
            let id = shapes.alloc(y1, y2, span);
            for x in x1..=x2 {
                columns.push(x, id);
            }

            #[allow(
                clippy::cast_sign_loss,
                reason = "y2 >= y1 is a loader invariant, so the span is non-negative"
            )]
            let mirror_span = (y2 - y1 + 1) as u32;
            let mirror = shapes.alloc(x1, x2, mirror_span);
            for y in y1..=y2 {
                columns.push(y, mirror);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_index::RawColumns;

    #[test]
    fn alloc_reuses_reclaimed_slots() {
        let mut store = ShapeStore::new();
        let a = store.alloc(0, 0, 1);
        let b = store.alloc(1, 1, 1);
        assert!(store.release(a));
        let c = store.alloc(2, 2, 1);
        // `c` reuses `a`'s freed slot.
        assert_eq!(store.get(c).y1, 2);
        assert_eq!(store.get(b).y1, 1);
    }

    #[test]
    fn clone_shape_is_independent() {
        let mut store = ShapeStore::new();
        let a = store.alloc(3, 5, 2);
        let clone = store.clone_shape(a);
        assert_ne!(a, clone);
        assert_eq!(store.get(clone).y1, 3);
        assert_eq!(store.get(clone).y2, 5);
        // Original keeps its own refcount; releasing the clone doesn't
        // affect it.
        assert!(store.release(clone));
        assert!(store.release(a));
    }

    #[test]
    fn insert_point_mirrors_into_both_columns() {
        let mut store = ShapeStore::new();
        let mut columns = RawColumns::new(10);
        insert::insert_point(&mut store, &mut columns, 2, 7);
        let at_2: Vec<_> = columns.column(2).iter().map(|&id| *store.get(id)).collect();
        let at_7: Vec<_> = columns.column(7).iter().map(|&id| *store.get(id)).collect();
        assert_eq!(at_2, vec![VerticalShape::new(7, 7, 1)]);
        assert_eq!(at_7, vec![VerticalShape::new(2, 2, 1)]);
    }

    #[test]
    fn insert_vertical_true_vertical_mirrors_as_unit_run() {
        let mut store = ShapeStore::new();
        let mut columns = RawColumns::new(10);
        insert::insert_vertical(&mut store, &mut columns, 3, 3, 1, 3);
        assert_eq!(columns.column(3).len(), 1);
        let shape = *store.get(columns.column(3)[0]);
        assert_eq!((shape.y1, shape.y2), (1, 3));
        for y in 1..=3 {
            let at_y = columns.column(y);
            assert_eq!(at_y.len(), 1);
            let mirror = *store.get(at_y[0]);
            assert_eq!((mirror.y1, mirror.y2), (3, 3));
        }
    }

    #[test]
    fn insert_vertical_rectangle_mirrors_across_both_ranges() {
        let mut store = ShapeStore::new();
        let mut columns = RawColumns::new(10);
        insert::insert_vertical(&mut store, &mut columns, 0, 2, 5, 6);
        for x in 0..=2 {
            let shape = *store.get(columns.column(x)[0]);
            assert_eq!((shape.y1, shape.y2), (5, 6));
        }
        for y in 5..=6 {
            let shape = *store.get(columns.column(y)[0]);
            assert_eq!((shape.y1, shape.y2), (0, 2));
        }
    }
}
