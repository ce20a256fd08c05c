// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! PesTrie core: the geometric index and query engine behind a points-to /
//! alias analysis answer.
//!
//! A PesTrie encodes a pointer equivalence relation as a set of coalesced
//! axis-aligned shapes indexed by x-coordinate (pre-order label). This
//! crate owns that index after it has been decoded from a binary index
//! file (see `pestrie_loader`) — shape storage, the per-column segment
//! index, the tree/equivalence-set tables derived from the pre-order map,
//! and the four query primitives (`IsAlias`, `ListPointsTo`,
//! `ListAliases`, `ListPointedTo`) plus their side-effect-index duals
//! (`ListModRefVars`, `ListConflicts`).
//!
//! # Example
//!
//! ```rust
//! use pestrie_core::index::{Index, IndexKind};
//! use pestrie_core::segment_index::RawColumns;
//! use pestrie_core::shapes::ShapeStore;
//! use pestrie_core::tables::TreeTables;
//!
//! // n=1 pointer, m=1 object, V=2, preV=[0, 0]: pointer 0 and object 0
//! // share the tree rooted at pre-order 0.
//! let pre_order = vec![0, 0];
//! let tables = TreeTables::build(&pre_order, 1, 1, 2);
//! let mut shapes = ShapeStore::new();
//! let segment_index = RawColumns::new(2).coalesce(&mut shapes);
//! let index = Index::new(IndexKind::PointsTo, 1, 1, 2, pre_order, tables, segment_index, shapes, 0);
//!
//! assert!(index.is_alias(0, 0));
//! assert_eq!(index.list_points_to(0), 1);
//! ```

pub mod index;
pub mod segment_index;
pub mod shapes;
pub mod tables;

pub use index::{EsPointerLists, Index, IndexKind, IndexProfile};
pub use segment_index::{BucketStats, ColumnBucket, RawColumns, SegmentIndex};
pub use shapes::{ShapeId, ShapeStore, VerticalShape};
pub use tables::{TreeTables, UNREPRESENTED};
