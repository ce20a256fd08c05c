// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The segment index: one ordered, coalesced bucket of shapes per
//! x-coordinate column.
//!
//! Column buckets are kept as [`SmallVec`]s rather than plain `Vec`s —
//! coalesced buckets are small in practice (a handful of disjoint runs), the
//! same assumption `understory_index`'s grid backend makes about its per-cell
//! slot lists.

use smallvec::SmallVec;

use crate::shapes::{ShapeId, ShapeStore};

const INLINE_BUCKET_LEN: usize = 4;

/// The uncoalesced, per-column shape lists built while decoding an index.
///
/// Shapes are appended in decode order; [`RawColumns::coalesce`] sorts and
/// merges each column once decoding is complete, producing a
/// [`SegmentIndex`].
#[derive(Debug)]
pub struct RawColumns {
    columns: Vec<SmallVec<[ShapeId; INLINE_BUCKET_LEN]>>,
}

impl RawColumns {
    /// Creates `vertex_num` empty columns.
    #[must_use]
    pub fn new(vertex_num: usize) -> Self {
        Self {
            columns: vec![SmallVec::new(); vertex_num],
        }
    }

    /// Appends a shape reference to column `x`.
    pub fn push(&mut self, x: i32, shape: ShapeId) {
        #[allow(
            clippy::cast_sign_loss,
            reason = "columns are indexed by pre-order labels, always non-negative"
        )]
        let x = x as usize;
        self.columns[x].push(shape);
    }

    /// Shapes currently queued for column `x` (pre-coalesce), for tests.
    #[cfg(test)]
    pub(crate) fn column(&self, x: i32) -> &[ShapeId] {
        #[allow(clippy::cast_sign_loss, reason = "test helper, x is a valid column")]
        &self.columns[x as usize]
    }

    /// Sorts and coalesces every column, consuming the raw buckets and
    /// producing the final [`SegmentIndex`].
    ///
    /// See [`coalesce_column`] for the per-column algorithm.
    #[must_use]
    pub fn coalesce(mut self, shapes: &mut ShapeStore) -> SegmentIndex {
        let columns = self
            .columns
            .drain(..)
            .map(|bucket| coalesce_column(bucket, shapes))
            .collect();
        SegmentIndex { columns }
    }
}

/// A single coalesced column: shapes sorted by `y1`, pairwise disjoint with a
/// gap of at least one between adjacent runs (`b.y1 > a.y2 + 1`).
pub type ColumnBucket = SmallVec<[ShapeId; INLINE_BUCKET_LEN]>;

/// The full per-column shape index, one (possibly empty) [`ColumnBucket`] per
/// pre-order label in `[0, vertex_num)`.
#[derive(Debug)]
pub struct SegmentIndex {
    columns: Vec<ColumnBucket>,
}

impl SegmentIndex {
    /// The shapes covering column `x`, or an empty slice if there are none.
    #[must_use]
    pub fn column(&self, x: usize) -> &[ShapeId] {
        self.columns
            .get(x)
            .map(SmallVec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of columns (equal to the loaded index's `vertex_num`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no columns at all (only true for a zero-vertex index).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of non-empty columns, plus the total shape-reference count
    /// across all columns. Used by `--do-profile` to report index shape.
    #[must_use]
    pub fn bucket_stats(&self) -> BucketStats {
        let mut non_empty = 0usize;
        let mut total_refs = 0usize;
        let mut max_len = 0usize;
        for bucket in &self.columns {
            if !bucket.is_empty() {
                non_empty += 1;
                total_refs += bucket.len();
                max_len = max_len.max(bucket.len());
            }
        }
        BucketStats {
            non_empty_columns: non_empty,
            total_shape_refs: total_refs,
            max_bucket_len: max_len,
        }
    }
}

/// Summary statistics over a [`SegmentIndex`]'s coalesced buckets, reported
/// by `--do-profile`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketStats {
    /// Columns with at least one shape.
    pub non_empty_columns: usize,
    /// Total shape references across all columns (a shape shared by k
    /// columns counts k times).
    pub total_shape_refs: usize,
    /// The largest single bucket, post-coalesce.
    pub max_bucket_len: usize,
}

/// Sorts `bucket` by `y1` and merges continuous/overlapping runs, applying
/// the copy-on-write rule whenever the run being extended is still shared
/// with another column (`refcount > 1`).
fn coalesce_column(
    mut bucket: SmallVec<[ShapeId; INLINE_BUCKET_LEN]>,
    shapes: &mut ShapeStore,
) -> ColumnBucket {
    if bucket.len() <= 1 {
        return bucket;
    }

    bucket.sort_by_key(|&id| shapes.get(id).y1);

    let mut write = 0usize;
    for read in 1..bucket.len() {
        let last_id = bucket[write];
        let next_id = bucket[read];
        let last = *shapes.get(last_id);
        let next = *shapes.get(next_id);

        if next.y1 > last.y2 + 1 {
            write += 1;
            bucket[write] = next_id;
        } else {
            let extended_y2 = last.y2.max(next.y2);
            let live_id = if shapes.get(last_id).is_shared() {
                let cloned = shapes.clone_shape(last_id);
                shapes.release(last_id);
                bucket[write] = cloned;
                cloned
            } else {
                last_id
            };
            shapes.extend_y2(live_id, extended_y2);
            shapes.release(next_id);
        }
    }
    bucket.truncate(write + 1);
    bucket
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::insert;

    #[test]
    fn touching_runs_merge() {
        // (2,3) and (4,7) at the same column touch with no gap at all
        // (4 == 3 + 1), so they merge into (2,7).
        let mut shapes = ShapeStore::new();
        let mut raw = RawColumns::new(10);
        insert::insert_vertical(&mut shapes, &mut raw, 5, 5, 2, 3);
        insert::insert_vertical(&mut shapes, &mut raw, 5, 5, 4, 7);
        let index = raw.coalesce(&mut shapes);
        let bucket = index.column(5);
        assert_eq!(bucket.len(), 1);
        let shape = shapes.get(bucket[0]);
        assert_eq!((shape.y1, shape.y2), (2, 7));
    }

    #[test]
    fn runs_with_a_one_value_gap_stay_disjoint() {
        // (2,3) and (5,7): y1=5 is strictly greater than y2+1=4, so per
        // `y1[k] > y2[k-1] + 1` these stay disjoint even though only one
        // value (4) separates them.
        let mut shapes = ShapeStore::new();
        let mut raw = RawColumns::new(10);
        insert::insert_vertical(&mut shapes, &mut raw, 5, 5, 2, 3);
        insert::insert_vertical(&mut shapes, &mut raw, 5, 5, 5, 7);
        let index = raw.coalesce(&mut shapes);
        let bucket = index.column(5);
        assert_eq!(bucket.len(), 2);
        assert_eq!(
            (shapes.get(bucket[0]).y1, shapes.get(bucket[0]).y2),
            (2, 3)
        );
        assert_eq!(
            (shapes.get(bucket[1]).y1, shapes.get(bucket[1]).y2),
            (5, 7)
        );
    }

    #[test]
    fn point_run_coalesces_into_one_shape() {
        // Scenario C: three unit shapes at column 0 for y in {1, 2, 3}.
        let mut shapes = ShapeStore::new();
        let mut raw = RawColumns::new(5);
        for y in [1, 2, 3] {
            insert::insert_point(&mut shapes, &mut raw, 0, y);
        }
        let index = raw.coalesce(&mut shapes);
        let bucket = index.column(0);
        assert_eq!(bucket.len(), 1);
        let shape = shapes.get(bucket[0]);
        assert_eq!((shape.y1, shape.y2), (1, 3));
    }

    #[test]
    fn shared_shape_is_cloned_on_write_not_mutated_in_place() {
        // A rectangle x in [0,2] x y in [5,6] shares one physical shape
        // across columns 0, 1, 2. Coalescing column 0 against an extra
        // overlapping shape must not affect columns 1 and 2.
        let mut shapes = ShapeStore::new();
        let mut raw = RawColumns::new(10);
        insert::insert_vertical(&mut shapes, &mut raw, 0, 2, 5, 6);
        insert::insert_vertical(&mut shapes, &mut raw, 0, 0, 4, 5);
        let index = raw.coalesce(&mut shapes);

        let bucket0 = index.column(0);
        assert_eq!(bucket0.len(), 1);
        assert_eq!(
            (shapes.get(bucket0[0]).y1, shapes.get(bucket0[0]).y2),
            (4, 6)
        );

        for col in [1, 2] {
            let bucket = index.column(col);
            assert_eq!(bucket.len(), 1);
            assert_eq!(
                (shapes.get(bucket[0]).y1, shapes.get(bucket[0]).y2),
                (5, 6)
            );
        }
    }
}
