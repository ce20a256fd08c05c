// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The assembled, read-only [`Index`] and its four query primitives.
//!
//! This is the "global engine state, owned" redesign the distilled spec's
//! Design Notes call for: the source keeps every table as a process-wide
//! singleton; here they're packaged into one immutable value returned by
//! the loader and passed by reference into every query.

use std::cell::Cell;

use crate::segment_index::{BucketStats, SegmentIndex};
use crate::shapes::ShapeStore;
use crate::tables::{TreeTables, UNREPRESENTED};

/// Which flavor of relation an [`Index`] encodes.
///
/// Side-effect indexes additionally support [`Index::list_conflicts`],
/// gated by [`Index::max_store_prev`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexKind {
    /// Points-to: `ListPointsTo`/`ListPointedTo` are the primary queries.
    PointsTo,
    /// Side-effect (mod/ref): stores precede loads in pre-order numbering,
    /// enabling [`Index::list_conflicts`].
    SideEffect,
}

/// A fully loaded, immutable PesTrie index, ready to answer queries.
///
/// Built once by `pestrie_loader` and never mutated afterwards — every
/// query method here takes `&self`.
#[derive(Debug)]
pub struct Index {
    kind: IndexKind,
    n: usize,
    m: usize,
    vertex_num: usize,
    pre_order: Vec<i32>,
    tables: TreeTables,
    segment_index: SegmentIndex,
    shapes: ShapeStore,
    max_store_prev: i32,
    same_tree_hits: Cell<u64>,
}

impl Index {
    /// Assembles an `Index` from its already-built parts. Called by
    /// `pestrie_loader` once decoding and coalescing finish.
    #[must_use]
    pub fn new(
        kind: IndexKind,
        n: usize,
        m: usize,
        vertex_num: usize,
        pre_order: Vec<i32>,
        tables: TreeTables,
        segment_index: SegmentIndex,
        shapes: ShapeStore,
        max_store_prev: i32,
    ) -> Self {
        debug_assert_eq!(pre_order.len(), n + m);
        Self {
            kind,
            n,
            m,
            vertex_num,
            pre_order,
            tables,
            segment_index,
            shapes,
            max_store_prev,
            same_tree_hits: Cell::new(0),
        }
    }

    /// Whether this is a points-to or side-effect index.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Pointer count (`n`).
    #[must_use]
    pub fn pointer_count(&self) -> usize {
        self.n
    }

    /// Object count (`m`).
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.m
    }

    /// Sentinel-inclusive column count (`V`).
    #[must_use]
    pub fn vertex_num(&self) -> usize {
        self.vertex_num
    }

    fn pre_order_of(&self, entity: usize) -> i32 {
        self.pre_order[entity]
    }

    /// The pre-order label (`preV`) of pointer-space entity `entity`
    /// (pointer index, or `n + object` index), or [`UNREPRESENTED`].
    ///
    /// Exposed for query drivers that need to group external pointer ids
    /// by equivalence-set label themselves — building the plan-mode
    /// `es2baseptrs` override is the motivating case.
    #[must_use]
    pub fn pre_order(&self, entity: usize) -> i32 {
        self.pre_order_of(entity)
    }

    /// The object index corresponding to pointer-space id `o + n`, used by
    /// [`Index::list_pointed_to`]'s `ListAliases(o + n)` reduction.
    fn object_as_pointer_space(&self, object: usize) -> usize {
        self.n + object
    }

    /// **IsAlias(x, y)**: do pointers `x` and `y` ever reference a common
    /// object?
    ///
    /// Same-tree pointers are aliases by construction; otherwise this is a
    /// single O(log k) point-location in the bucket at column `preV[x]`.
    #[must_use]
    pub fn is_alias(&self, x: usize, y: usize) -> bool {
        let tx = self.tables.tree_of(x);
        let ty = self.tables.tree_of(y);
        if tx == UNREPRESENTED || ty == UNREPRESENTED {
            return false;
        }
        if tx == ty {
            self.same_tree_hits.set(self.same_tree_hits.get() + 1);
            return true;
        }
        let px = self.pre_order_of(x);
        let py = self.pre_order_of(y);
        #[allow(
            clippy::cast_sign_loss,
            reason = "tree_of(x) != UNREPRESENTED guarantees pre_order_of(x) >= 0"
        )]
        let bucket = self.segment_index.column(px as usize);
        bucket_covers(bucket, &self.shapes, py)
    }

    /// **ListPointsTo(x)**: how many objects may `x` reference?
    ///
    /// Sums the self-tree contribution with every shape's root-tree
    /// contribution at column `preV[x]`. Only a shape's `y1` is consulted —
    /// see the distilled spec's note that `y2` is a storage artifact here,
    /// not an additional target.
    #[must_use]
    pub fn list_points_to(&self, x: usize) -> u32 {
        let tx = self.tables.tree_of(x);
        if tx == UNREPRESENTED {
            return 0;
        }
        #[allow(clippy::cast_sign_loss, reason = "tx != UNREPRESENTED, so it is a valid tree index")]
        let mut answer = self.tables.objs_in_tree(tx as usize);

        #[allow(
            clippy::cast_sign_loss,
            reason = "tree_of(x) != UNREPRESENTED guarantees pre_order_of(x) >= 0"
        )]
        let column = self.pre_order_of(x) as usize;
        for shape in self.segment_index.column(column) {
            let y1 = self.shapes.get(*shape).y1;
            #[allow(clippy::cast_sign_loss, reason = "y1 is a validated column index")]
            if self.tables.is_root(y1 as usize) {
                #[allow(clippy::cast_sign_loss, reason = "is_root confirms a valid root label")]
                let root_tree = self.tables.tree_rooted_at(y1 as usize);
                #[allow(clippy::cast_sign_loss, reason = "tree_rooted_at returned a valid tree id")]
                answer += self.tables.objs_in_tree(root_tree as usize);
            }
        }
        answer
    }

    /// Equivalent to [`Index::list_points_to`]; the distinction from the
    /// distilled spec is semantic (mod/ref variable counting) only.
    #[must_use]
    pub fn list_mod_ref_vars(&self, x: usize) -> u32 {
        self.list_points_to(x)
    }

    /// **ListAliases(x)**: how many pointers alias `x`?
    ///
    /// Visits every ES group in `x`'s own tree, then every ES group covered
    /// by any shape at column `preV[x]`. `pointer_lists` overrides the
    /// default `es2pointers` table when present — the per-query
    /// `es2baseptrs` built by plan mode from only the pointers mentioned in
    /// the plan.
    #[must_use]
    pub fn list_aliases(&self, x: usize, pointer_lists: Option<&EsPointerLists>) -> u32 {
        let tx = self.tables.tree_of(x);
        if tx == UNREPRESENTED {
            return 0;
        }
        #[allow(clippy::cast_sign_loss, reason = "tx != UNREPRESENTED, so it is a valid tree index")]
        let tx = tx as usize;

        let mut answer = 0u32;
        let root = self.tables.obj_rank(tx);
        let next_root = self.tables.obj_rank(tx + 1);
        #[allow(clippy::cast_sign_loss, reason = "obj_rank entries are valid column bounds")]
        for es in (root as usize)..(next_root as usize) {
            answer += self.visit(es, pointer_lists);
        }

        #[allow(
            clippy::cast_sign_loss,
            reason = "tree_of(x) != UNREPRESENTED guarantees pre_order_of(x) >= 0"
        )]
        let column = self.pre_order_of(x) as usize;
        for shape in self.segment_index.column(column) {
            let s = self.shapes.get(*shape);
            #[allow(clippy::cast_sign_loss, reason = "shape bounds are valid column indices")]
            for es in s.y1..=s.y2 {
                answer += self.visit(es as usize, pointer_lists);
            }
        }
        answer
    }

    /// **ListPointedTo(o)** ≡ `ListAliases(o + n)`.
    #[must_use]
    pub fn list_pointed_to(&self, o: usize, pointer_lists: Option<&EsPointerLists>) -> u32 {
        self.list_aliases(self.object_as_pointer_space(o), pointer_lists)
    }

    /// **ListConflicts(x)**: only meaningful for a side-effect index. For
    /// stores (`preV[x] < max_store_prev`), delegates to
    /// [`Index::list_aliases`]; otherwise returns 0.
    #[must_use]
    pub fn list_conflicts(&self, x: usize, pointer_lists: Option<&EsPointerLists>) -> u32 {
        if self.pre_order_of(x) < self.max_store_prev {
            self.list_aliases(x, pointer_lists)
        } else {
            0
        }
    }

    /// `obj_rank[m/2]` by the side-effect builder's convention: the
    /// boundary pre-order separating stores from loads.
    #[must_use]
    pub fn max_store_prev(&self) -> i32 {
        self.max_store_prev
    }

    /// Number of `IsAlias` calls answered by the same-tree fast path,
    /// without touching the segment index at all.
    #[must_use]
    pub fn same_tree_hits(&self) -> u64 {
        self.same_tree_hits.get()
    }

    fn visit(&self, es: usize, pointer_lists: Option<&EsPointerLists>) -> u32 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "an ES's pointer list is always far smaller than u32::MAX"
        )]
        let len = match pointer_lists {
            Some(overrides) => overrides.pointers_in_es(es).len() as u32,
            None => self.tables.pointers_in_es(es).len() as u32,
        };
        len
    }

    /// Summary statistics reported by `--do-profile`.
    #[must_use]
    pub fn profile(&self) -> IndexProfile {
        IndexProfile {
            kind: self.kind,
            n: self.n,
            m: self.m,
            vertex_num: self.vertex_num,
            tree_count: self.tables.tree_count(),
            live_shapes: self.shapes.live_count(),
            bucket_stats: self.segment_index.bucket_stats(),
            same_tree_hits: self.same_tree_hits.get(),
        }
    }
}

/// Binary-searches `bucket` (sorted by `y1`, and by the post-coalesce
/// disjointness invariant also monotonically increasing by `y2`) for a
/// shape covering `y`.
///
/// Finds the smallest index `i` with `bucket[i].y2 >= y`; if that shape's
/// `y1 <= y`, `y` is covered.
fn bucket_covers(bucket: &[crate::shapes::ShapeId], shapes: &ShapeStore, y: i32) -> bool {
    let idx = bucket.partition_point(|&id| shapes.get(id).y2 < y);
    match bucket.get(idx) {
        Some(&id) => shapes.get(id).y1 <= y,
        None => false,
    }
}

/// A per-query override of the default `es2pointers` table, built by plan
/// mode from only the pointers mentioned in the current query plan (the
/// distilled spec's `es2baseptrs`).
#[derive(Debug, Default)]
pub struct EsPointerLists {
    by_es: std::collections::HashMap<usize, Vec<u32>>,
}

impl EsPointerLists {
    /// Creates an empty override table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that pointer `pointer` (in plan order) shares equivalence-set
    /// label `es`.
    pub fn insert(&mut self, es: usize, pointer: u32) {
        self.by_es.entry(es).or_default().push(pointer);
    }

    /// The pointers recorded under equivalence-set label `es`.
    #[must_use]
    pub fn pointers_in_es(&self, es: usize) -> &[u32] {
        self.by_es.get(&es).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Index-wide statistics surfaced by `--do-profile`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexProfile {
    /// The index's flavor.
    pub kind: IndexKind,
    /// Pointer count.
    pub n: usize,
    /// Object count.
    pub m: usize,
    /// Sentinel-inclusive column count.
    pub vertex_num: usize,
    /// Number of distinct trees.
    pub tree_count: usize,
    /// Live (non-reclaimed) shapes remaining after coalescing.
    pub live_shapes: usize,
    /// Column bucket statistics.
    pub bucket_stats: BucketStats,
    /// `IsAlias` calls resolved by the same-tree fast path.
    pub same_tree_hits: u64,
}
