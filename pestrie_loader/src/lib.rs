// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decodes a PesTrie binary index file into a loaded
//! [`pestrie_core::Index`].
//!
//! The format is a fixed 32-bit-native-endian header followed by the
//! pre-order map and a packed rectangle/vertical/horizontal/point record
//! stream. See [`decode`] for the field-by-field layout, transcribed from
//! the reference builder's reader.

use std::fs;
use std::path::Path;

use pestrie_core::index::{Index, IndexKind};
use pestrie_core::segment_index::RawColumns;
use pestrie_core::shapes::{insert, ShapeStore};
use pestrie_core::tables::TreeTables;

/// Magic bytes identifying a points-to index.
pub const MAGIC_POINTS_TO: &[u8; 4] = b"PES1";
/// Magic bytes identifying a side-effect (mod/ref) index.
pub const MAGIC_SIDE_EFFECT: &[u8; 4] = b"SES1";

const HEADER_INT_COUNT: usize = 7; // n, m, vertex_num, n_rects, n_verticals, n_horizontals, n_points
const HEADER_SIZE_BYTES: usize = 4 + HEADER_INT_COUNT * 4;

/// Errors that can occur while opening or decoding an index file.
///
/// Mirrors the distilled spec's fatal-error taxonomy: any of these aborts
/// the load before the query phase is ever entered.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The index file could not be opened (missing, permissions, etc).
    #[error("cannot open index file {path}: {source}")]
    IndexOpen {
        /// The path that failed to open.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file's magic bytes don't match a known index flavor.
    #[error("invalid PesTrie index: unrecognized magic {magic:?}")]
    IndexFormat {
        /// The four magic bytes actually read.
        magic: [u8; 4],
    },
    /// A block (header, pre-order map, or a record stream) ended before
    /// its declared length.
    #[error("truncated PesTrie index: expected {expected} more bytes at offset {offset}, found {found}")]
    IndexTruncation {
        /// Byte offset where the short read was detected.
        offset: usize,
        /// Bytes the format declared should follow.
        expected: usize,
        /// Bytes actually available.
        found: usize,
    },
}

/// Reads and decodes the index file at `path`.
pub fn load(path: &Path) -> Result<Index, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::IndexOpen {
        path: path.display().to_string(),
        source,
    })?;
    decode(&bytes)
}

/// Decodes an already-read index file's bytes.
///
/// Layout (all integers 32-bit native endian):
///
/// 1. 4-byte magic (`PES1` points-to, `SES1` side-effect).
/// 2. Header: `n`, `m`, `vertex_num` (stored as `V - 1`; a sentinel column
///    is added on load), `n_rects`, `n_verticals`, `n_horizontals`,
///    `n_points`.
/// 3. `preV[0..n+m)`.
/// 4. `n_rects` records of 4 ints each: `(x1, y1, x2, y2)`.
/// 5. `n_verticals` records of 3 ints each: `(y1, x, y2)`.
/// 6. `n_horizontals` records of 3 ints each, decoded identically to
///    verticals — see [`pestrie_core::shapes::insert::insert_vertical`]'s
///    doc comment.
/// 7. Points, run-length encoded as repeated `(x, count, y_1..y_count)`
///    groups until `n_points` total `y`s are consumed.
pub fn decode(data: &[u8]) -> Result<Index, LoadError> {
    let mut cur = Reader::new(data);

    let magic = cur.take_array::<4>()?;
    let kind = if &magic == MAGIC_POINTS_TO {
        IndexKind::PointsTo
    } else if &magic == MAGIC_SIDE_EFFECT {
        IndexKind::SideEffect
    } else {
        return Err(LoadError::IndexFormat { magic });
    };

    let n = cur.take_i32()? as usize;
    let m = cur.take_i32()? as usize;
    let vertex_num = cur.take_i32()? as usize + 1;
    let n_rects = cur.take_i32()? as usize;
    let n_verticals = cur.take_i32()? as usize;
    let n_horizontals = cur.take_i32()? as usize;
    let mut n_points = cur.take_i32()? as usize;

    let mut pre_order = Vec::with_capacity(n + m);
    for _ in 0..n + m {
        pre_order.push(cur.take_i32()?);
    }

    let tables = TreeTables::build(&pre_order, n, m, vertex_num);
    let max_store_prev = if kind == IndexKind::SideEffect {
        // Object merging can collapse m objects into far fewer than m/2
        // trees, so m/2 is not a valid `obj_rank` index in general — clamp
        // to the highest tree id actually present.
        let clamped = (m / 2).min(tables.tree_count());
        tables.obj_rank(clamped)
    } else {
        0
    };

    let mut shapes = ShapeStore::new();
    let mut columns = RawColumns::new(vertex_num);

    for _ in 0..n_rects {
        let x1 = cur.take_i32()?;
        let y1 = cur.take_i32()?;
        let x2 = cur.take_i32()?;
        let y2 = cur.take_i32()?;
        insert::insert_vertical(&mut shapes, &mut columns, x1, x2, y1, y2);
    }

    for _ in 0..n_verticals {
        let y1 = cur.take_i32()?;
        let x = cur.take_i32()?;
        let y2 = cur.take_i32()?;
        insert::insert_vertical(&mut shapes, &mut columns, x, x, y1, y2);
    }

    // Horizontal records share the vertical triple layout bit-for-bit; the
    // reference builder's reader decodes both through the same call.
    for _ in 0..n_horizontals {
        let y1 = cur.take_i32()?;
        let x = cur.take_i32()?;
        let y2 = cur.take_i32()?;
        insert::insert_vertical(&mut shapes, &mut columns, x, x, y1, y2);
    }

    while n_points > 0 {
        let x = cur.take_i32()?;
        let count = cur.take_i32()? as usize;
        for _ in 0..count {
            let y = cur.take_i32()?;
            insert::insert_point(&mut shapes, &mut columns, x, y);
        }
        n_points -= count;
    }

    let segment_index = columns.coalesce(&mut shapes);

    log::info!(
        "loaded {} index: n={n} m={m} vertex_num={vertex_num} trees={}",
        match kind {
            IndexKind::PointsTo => "points-to",
            IndexKind::SideEffect => "side-effect",
        },
        tables.tree_count(),
    );

    Ok(Index::new(
        kind,
        n,
        m,
        vertex_num,
        pre_order,
        tables,
        segment_index,
        shapes,
        max_store_prev,
    ))
}

/// A cursor over a byte slice that decodes fixed-width native-endian
/// integers, reporting [`LoadError::IndexTruncation`] on a short read
/// instead of panicking.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        if self.data.len() < self.pos + N {
            return Err(LoadError::IndexTruncation {
                offset: self.pos,
                expected: N,
                found: self.data.len() - self.pos,
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    fn take_i32(&mut self) -> Result<i32, LoadError> {
        self.take_array::<4>().map(i32::from_ne_bytes)
    }
}
