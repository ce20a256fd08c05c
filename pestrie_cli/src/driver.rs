// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The query driver: plan mode (replay a query-plan file) and simulation
//! mode (randomized queries), dispatching through the closed [`QueryKind`]
//! enum onto a loaded [`Index`].

use std::fmt;
use std::fs;
use std::path::Path;

use pestrie_core::index::{EsPointerLists, Index, IndexKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cli::QueryKind;

/// Non-fatal driver errors (distilled spec §7: `PlanOpenError`,
/// `IncompatibleQueryError`). Both are logged as diagnostics by `main` and
/// leave the process exit code at 0 — only fatal load errors
/// (`pestrie_loader::LoadError`) affect the exit code.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The query plan file couldn't be opened.
    #[error("cannot open query plan file {path}: {source}")]
    PlanOpen {
        /// The path that failed to open.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// `query_type` isn't supported by the loaded index's flavor.
    #[error("query type {query_type:?} is not supported by a {index_kind:?} index")]
    IncompatibleQuery {
        /// The requested query type.
        query_type: QueryKind,
        /// The loaded index's flavor.
        index_kind: IndexKind,
    },
}

/// A single query's answer: `IsAlias` yields a boolean, every other query
/// type yields a count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryAnswer {
    /// `IsAlias(x, y)`'s result.
    Alias(bool),
    /// Every listing query's result.
    Count(u32),
}

impl fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alias(b) => write!(f, "{b}"),
            Self::Count(c) => write!(f, "{c}"),
        }
    }
}

/// Summary counters for a completed driver run, surfaced by `--do-profile`
/// alongside [`pestrie_core::IndexProfile`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Queries actually issued against the index.
    pub queries_run: usize,
    /// Plan entries referencing a pointer id at or beyond the index's
    /// pointer count, or a pre-order label at or beyond `vertex_num`
    /// (distilled spec's `OutOfRangeObservation`): logged and skipped, not
    /// added to `es2baseptrs`, but counted here.
    pub out_of_range_observations: usize,
}

/// Checks that `query_type` is valid for `index_kind`, per the distilled
/// spec's §4.4 PT/SE compatibility gate.
pub fn check_compatible(query_type: QueryKind, index_kind: IndexKind) -> Result<(), DriverError> {
    let ok = match index_kind {
        IndexKind::PointsTo => query_type.supported_on_points_to(),
        IndexKind::SideEffect => query_type.supported_on_side_effect(),
    };
    if ok {
        Ok(())
    } else {
        Err(DriverError::IncompatibleQuery {
            query_type,
            index_kind,
        })
    }
}

/// Runs `query_type` in plan mode: reads `plan_path`, groups its pointer
/// ids into an `es2baseptrs` override, then evaluates the plan exactly as
/// §4.4 describes (`IsAlias` over every unordered pair, listing queries one
/// at a time), optionally printing each answer.
pub fn run_plan(
    index: &Index,
    query_type: QueryKind,
    plan_path: &Path,
    print_answers: bool,
) -> Result<RunReport, DriverError> {
    let text = fs::read_to_string(plan_path).map_err(|source| DriverError::PlanOpen {
        path: plan_path.display().to_string(),
        source,
    })?;

    let mut report = RunReport::default();
    let mut raw_ids = Vec::new();
    for token in text.split_whitespace() {
        match token.parse::<usize>() {
            Ok(p) => raw_ids.push(p),
            Err(_) => log::warn!("skipping malformed query-plan entry {token:?}"),
        }
    }

    // Plan entries are generic ids fed straight to whichever query is
    // selected: pointer ids for every query type except `ListPointedTo`,
    // which treats them as object ids (ListPointedTo(o) ≡ ListAliases(o +
    // n)). Bounds-check against the right count before the id ever
    // reaches `Index`, whose query methods index their tables directly
    // and don't bounds-check themselves.
    let object_indexed = query_type.is_object_indexed();
    let id_count = if object_indexed {
        index.object_count()
    } else {
        index.pointer_count()
    };

    let mut ids = Vec::with_capacity(raw_ids.len());
    let mut overrides = EsPointerLists::new();
    for &id in &raw_ids {
        if id >= id_count {
            log::warn!("plan id {id} exceeds {id_count}; skipping");
            report.out_of_range_observations += 1;
            continue;
        }
        ids.push(id);

        let entity = if object_indexed {
            index.pointer_count() + id
        } else {
            id
        };
        let preorder = index.pre_order(entity);
        if preorder < 0 {
            // Unrepresented entity: not an out-of-range observation, just
            // absent from every equivalence-set group.
            continue;
        }
        #[allow(
            clippy::cast_sign_loss,
            reason = "preorder >= 0 was just checked above"
        )]
        let es = preorder as usize;
        if es >= index.vertex_num() {
            log::warn!("plan id {id}'s pre-order {es} exceeds vertex_num {}; skipping", index.vertex_num());
            report.out_of_range_observations += 1;
            continue;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "plan ids fit comfortably in u32 for any realistic plan"
        )]
        overrides.insert(es, id as u32);
    }

    if query_type == QueryKind::IsAlias {
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let answer = QueryAnswer::Alias(index.is_alias(ids[i], ids[j]));
                report.queries_run += 1;
                if print_answers {
                    println!("IS_ALIAS({}, {}) = {answer}", ids[i], ids[j]);
                }
            }
        }
    } else {
        for &id in &ids {
            let answer = dispatch_single(index, query_type, id, Some(&overrides));
            report.queries_run += 1;
            if print_answers {
                println!("{query_type:?}({id}) = {answer}");
            }
        }
    }

    Ok(report)
}

/// Runs `query_type` in simulation mode: `n_query` randomized ids modulo
/// `n` (pointer-indexed queries) or `m` (`ListPointedTo`'s object id),
/// seeded by `seed` for reproducibility (distilled spec §5's determinism
/// guarantee, given a fixed seed).
///
/// `ListAccVars`/`ListConflicts` deviate from that random-sampling shape:
/// the reference builder's simulation loop feeds them the loop index
/// itself rather than a random draw, and forces the query count to `n`
/// rather than honoring the requested count, when run over a side-effect
/// index (`simulate_queries`, `if (index_type == SE_MATRIX) n_query = n`).
/// Since those two query types only ever run on a side-effect index
/// (`check_compatible` rejects every other pairing), that sequential sweep
/// is this function's behavior for both unconditionally, `n_query` ignored.
#[must_use]
pub fn run_simulation(
    index: &Index,
    query_type: QueryKind,
    n_query: usize,
    seed: u64,
    print_answers: bool,
) -> RunReport {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = RunReport::default();

    let n = index.pointer_count();
    let m = index.object_count();
    if n == 0 || (query_type.is_object_indexed() && m == 0) {
        log::warn!("index has no eligible ids for query type {query_type:?}; skipping simulation");
        return report;
    }

    if matches!(query_type, QueryKind::ListAccVars | QueryKind::ListConflicts) {
        for id in 0..n {
            let answer = dispatch_single(index, query_type, id, None);
            report.queries_run += 1;
            if print_answers {
                println!("{query_type:?}({id}) = {answer}");
            }
        }
        return report;
    }

    for _ in 0..n_query {
        if query_type == QueryKind::IsAlias {
            let x = rng.gen_range(0..n);
            let y = rng.gen_range(0..n);
            let answer = QueryAnswer::Alias(index.is_alias(x, y));
            report.queries_run += 1;
            if print_answers {
                println!("IS_ALIAS({x}, {y}) = {answer}");
            }
        } else {
            let id = if query_type.is_object_indexed() {
                rng.gen_range(0..m)
            } else {
                rng.gen_range(0..n)
            };
            let answer = dispatch_single(index, query_type, id, None);
            report.queries_run += 1;
            if print_answers {
                println!("{query_type:?}({id}) = {answer}");
            }
        }
    }

    report
}

fn dispatch_single(
    index: &Index,
    query_type: QueryKind,
    id: usize,
    pointer_lists: Option<&EsPointerLists>,
) -> QueryAnswer {
    match query_type {
        QueryKind::IsAlias => {
            unreachable!("IsAlias takes two operands and is dispatched by its callers directly")
        }
        QueryKind::ListPointsTo => QueryAnswer::Count(index.list_points_to(id)),
        QueryKind::ListPointedTo => QueryAnswer::Count(index.list_pointed_to(id, pointer_lists)),
        QueryKind::ListAliases => QueryAnswer::Count(index.list_aliases(id, pointer_lists)),
        QueryKind::ListAccVars => QueryAnswer::Count(index.list_mod_ref_vars(id)),
        QueryKind::ListConflicts => QueryAnswer::Count(index.list_conflicts(id, pointer_lists)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pestrie_core::segment_index::RawColumns;
    use pestrie_core::shapes::ShapeStore;
    use pestrie_core::tables::TreeTables;

    /// Scenario A: n=1, m=1, V=2, preV=[0, 0], no shapes.
    fn scenario_a() -> Index {
        let pre_order = vec![0, 0];
        let tables = TreeTables::build(&pre_order, 1, 1, 2);
        let mut shapes = ShapeStore::new();
        let segment_index = RawColumns::new(2).coalesce(&mut shapes);
        Index::new(
            IndexKind::PointsTo,
            1,
            1,
            2,
            pre_order,
            tables,
            segment_index,
            shapes,
            0,
        )
    }

    #[test]
    fn compatibility_gate_rejects_se_only_queries_on_pt_index() {
        assert!(check_compatible(QueryKind::ListConflicts, IndexKind::PointsTo).is_err());
        assert!(check_compatible(QueryKind::IsAlias, IndexKind::PointsTo).is_ok());
    }

    #[test]
    fn compatibility_gate_rejects_pt_only_queries_on_se_index() {
        assert!(check_compatible(QueryKind::ListPointsTo, IndexKind::SideEffect).is_err());
        assert!(check_compatible(QueryKind::IsAlias, IndexKind::SideEffect).is_err());
        assert!(check_compatible(QueryKind::ListAliases, IndexKind::SideEffect).is_err());
        assert!(check_compatible(QueryKind::ListConflicts, IndexKind::SideEffect).is_ok());
    }

    #[test]
    fn simulation_mode_is_deterministic_given_a_fixed_seed() {
        let index = scenario_a();
        let a = run_simulation(&index, QueryKind::ListPointsTo, 50, 7, false);
        let b = run_simulation(&index, QueryKind::ListPointsTo, 50, 7, false);
        assert_eq!(a, b);
        assert_eq!(a.queries_run, 50);
    }

    /// Scenario E: SE index, n=2, m=1, V=3, preV=[0, 2, 1], max_store_prev=1.
    fn scenario_e() -> Index {
        let pre_order = vec![0, 2, 1];
        let tables = TreeTables::build(&pre_order, 2, 1, 3);
        let mut shapes = ShapeStore::new();
        let segment_index = RawColumns::new(3).coalesce(&mut shapes);
        Index::new(
            IndexKind::SideEffect,
            2,
            1,
            3,
            pre_order,
            tables,
            segment_index,
            shapes,
            1,
        )
    }

    #[test]
    fn simulation_mode_sweeps_sequentially_for_side_effect_only_queries() {
        // ListConflicts/ListAccVars ignore n_query and sweep every pointer
        // exactly once, matching the reference builder's forced `n_query = n`
        // for side-effect indexes.
        let index = scenario_e();
        let report = run_simulation(&index, QueryKind::ListConflicts, 9999, 1, false);
        assert_eq!(report.queries_run, 2);
        let report = run_simulation(&index, QueryKind::ListAccVars, 1, 1, false);
        assert_eq!(report.queries_run, 2);
    }

    #[test]
    fn plan_mode_emits_one_is_alias_answer_per_unordered_pair() {
        let index = scenario_a();
        let file = tempfile_with_contents("0 0 0");
        let report = run_plan(&index, QueryKind::IsAlias, file.path(), false).unwrap();
        // 3 plan entries -> C(3,2) = 3 unordered pairs.
        assert_eq!(report.queries_run, 3);
    }

    #[test]
    fn plan_mode_reports_missing_file_as_plan_open_error() {
        let index = scenario_a();
        let err = run_plan(
            &index,
            QueryKind::IsAlias,
            Path::new("/nonexistent/plan.txt"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::PlanOpen { .. }));
    }

    #[test]
    fn plan_mode_skips_pointer_ids_beyond_pointer_count() {
        // Pointer 99 is beyond scenario A's single pointer (id 0) and must
        // never reach `Index::list_points_to`, which indexes its tables
        // directly without its own bounds check.
        let index = scenario_a();
        let file = tempfile_with_contents("0 99");
        let report = run_plan(&index, QueryKind::ListPointsTo, file.path(), false).unwrap();
        assert_eq!(report.queries_run, 1);
        assert_eq!(report.out_of_range_observations, 1);
    }

    fn tempfile_with_contents(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }
}
