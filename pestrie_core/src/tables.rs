// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree and equivalence-set tables derived from the pre-order map during
//! load: which pointers share a tree, which pre-order labels are tree
//! roots, and which pointers share an equivalence-set label.

/// Sentinel pre-order value meaning "this pointer or object has no
/// representative in the loaded index."
pub const UNREPRESENTED: i32 = -1;

/// Tree membership and equivalence-set tables built from a pre-order map.
///
/// Constructed once by [`TreeTables::build`] during load and never mutated
/// afterwards — every field here is read-only for the lifetime of the
/// loaded [`crate::index::Index`].
#[derive(Debug)]
pub struct TreeTables {
    /// `tree[i]` is the tree id pointer `i` belongs to, or [`UNREPRESENTED`].
    tree: Vec<i32>,
    /// Sorted distinct root pre-orders, with a sentinel `obj_rank[n_trees] =
    /// vertex_num` appended.
    obj_rank: Vec<i32>,
    /// `prev_to_tree[v] = t` iff `obj_rank[t] == v`; [`UNREPRESENTED`]
    /// elsewhere.
    prev_to_tree: Vec<i32>,
    /// `objs_in_tree[t]` counts the source objects collapsed into root `t`.
    objs_in_tree: Vec<u32>,
    /// `root_prevs[v] > 0` iff pre-order label `v` is a tree root.
    root_prevs: Vec<u32>,
    /// `es2pointers[label]` lists every pointer index sharing that
    /// pre-order label.
    es2pointers: Vec<Vec<u32>>,
    /// Number of distinct equivalence-set groups: `max(preV[i]) + 1` over
    /// pointers only. `es2pointers` itself is sized by `vertex_num`, so this
    /// is a statistic, not an allocation bound — see the distilled spec's
    /// Design Notes on which denominator dependent statistics should use.
    n_es: usize,
}

impl TreeTables {
    /// Builds the tree and ES tables from a loaded pre-order map.
    ///
    /// `pre_order` has length `n + m`: pointer pre-orders first, object
    /// pre-orders following. `vertex_num` is `V`, the sentinel-inclusive
    /// column count.
    ///
    /// Mirrors `pes-querier.cc`'s `read_index` tree-construction pass: first
    /// accumulate root candidates from the object range, then assign every
    /// pointer to the highest-ranked tree whose root precedes it.
    #[must_use]
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        reason = "pre-order labels are validated non-negative and below vertex_num before use as indices"
    )]
    pub fn build(pre_order: &[i32], n: usize, m: usize, vertex_num: usize) -> Self {
        let mut root_prevs = vec![0u32; vertex_num];
        let mut obj_rank = Vec::new();

        for &v in &pre_order[n..n + m] {
            if v == UNREPRESENTED {
                continue;
            }
            let v_idx = v as usize;
            if root_prevs[v_idx] == 0 {
                obj_rank.push(v);
            }
            root_prevs[v_idx] += 1;
        }
        obj_rank.sort_unstable();

        let n_trees = obj_rank.len();
        let mut prev_to_tree = vec![UNREPRESENTED; vertex_num];
        let mut objs_in_tree = vec![0u32; n_trees];
        for (t, &root) in obj_rank.iter().enumerate() {
            prev_to_tree[root as usize] = t as i32;
            objs_in_tree[t] = root_prevs[root as usize];
        }
        obj_rank.push(vertex_num as i32);

        let mut tree = vec![UNREPRESENTED; n];
        let mut es2pointers = vec![Vec::new(); vertex_num];
        let mut n_es = 0i32;
        for (i, &p) in pre_order[..n].iter().enumerate() {
            if p > n_es {
                n_es = p;
            }
            if p == UNREPRESENTED {
                continue;
            }
            let t = highest_rank_at_or_below(&obj_rank, p);
            tree[i] = t;
            es2pointers[p as usize].push(i as u32);
        }
        n_es += 1;

        Self {
            tree,
            obj_rank,
            prev_to_tree,
            objs_in_tree,
            root_prevs,
            es2pointers,
            #[allow(
                clippy::cast_sign_loss,
                reason = "n_es starts at -1+1=0 at worst, never negative after the increment above"
            )]
            n_es: n_es as usize,
        }
    }

    /// The tree id pointer `i` belongs to, or [`UNREPRESENTED`] if `i` has
    /// no pre-order label in the loaded index.
    #[must_use]
    pub fn tree_of(&self, pointer: usize) -> i32 {
        self.tree[pointer]
    }

    /// `obj_rank[t]`, the root pre-order of tree `t`, including the
    /// trailing sentinel at index `n_trees`.
    #[must_use]
    pub fn obj_rank(&self, tree: usize) -> i32 {
        self.obj_rank[tree]
    }

    /// Number of distinct trees (excludes the sentinel entry).
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.obj_rank.len() - 1
    }

    /// Number of source objects collapsed into tree `t`.
    #[must_use]
    pub fn objs_in_tree(&self, tree: usize) -> u32 {
        self.objs_in_tree[tree]
    }

    /// Whether pre-order label `v` is a tree root.
    #[must_use]
    pub fn is_root(&self, v: usize) -> bool {
        self.root_prevs[v] > 0
    }

    /// The tree id rooted at pre-order label `v`, or [`UNREPRESENTED`] if
    /// `v` is not a root.
    #[must_use]
    pub fn tree_rooted_at(&self, v: usize) -> i32 {
        self.prev_to_tree[v]
    }

    /// The pointers sharing pre-order label `es`.
    #[must_use]
    pub fn pointers_in_es(&self, es: usize) -> &[u32] {
        self.es2pointers.get(es).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct equivalence-set groups among pointers
    /// (`max(preV[i]) + 1`, pointers only; a statistic, not
    /// `es2pointers`'s allocation size, which is `vertex_num`).
    #[must_use]
    pub fn n_es(&self) -> usize {
        self.n_es
    }
}

/// Binary search for the highest tree index `t` with `obj_rank[t] <= p`.
///
/// `obj_rank` is sorted ascending and includes the trailing `vertex_num`
/// sentinel, so `p` is always strictly below the last entry and the search
/// never returns the sentinel index itself. Ties (the PES-builder may
/// assign one pre-order to several merged roots — see
/// [`crate::tables`]'s module docs) resolve to the *highest* matching `t`,
/// mirroring the source's `[s, e)` narrowing that moves `s = mid` on
/// equality.
fn highest_rank_at_or_below(obj_rank: &[i32], p: i32) -> i32 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "tree counts fit comfortably in i32 for any realistic index"
    )]
    let mut s = 0i32;
    #[allow(
        clippy::cast_possible_truncation,
        reason = "tree counts fit comfortably in i32 for any realistic index"
    )]
    let mut e = (obj_rank.len() - 1) as i32;
    while s < e {
        let mid = s + (e - s + 1) / 2;
        if obj_rank[mid as usize] <= p {
            s = mid;
        } else {
            e = mid - 1;
        }
    }
    s
}
