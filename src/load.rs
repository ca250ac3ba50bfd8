//! End-to-end import of a scenario folder.
//!
//! 1. **Discovery** -- classify the tree and bind one handler per match
//! 2. **Gating** -- drop files whose schema version is missing, garbled or too old
//! 3. **Population** -- insert every road network file's roads and junctions into
//!    the [`GraphStore`] in parallel; a duplicated identifier belongs to the file
//!    that comes first in discovery order
//! 4. **Resolution** -- after the barrier, resolve cross references
//! 5. **Role folding** -- merge same-role handlers in priority order
//!
//! Only a missing root directory aborts; everything else becomes a [`Diagnostic`].

use crate::discover::discover;
use crate::error::{EntityKind, Error, Result};
use crate::file_type::{DataKind, FileTypeTag};
use crate::handler::Handler;
use crate::road::CoverageIssue;
use crate::scenery::SceneryHandler;
use crate::stats::{ImportStats, StatsSnapshot};
use crate::store::{DanglingReference, GraphStore};
use crate::version::Version;
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Worker threads for parsing and insertion; `None` uses the hardware concurrency
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// Missing or unparseable file
    Structural,
    /// Missing/garbled/unsupported version or rejected merge
    Schema,
    /// Duplicate identifiers, dangling references, coverage gaps
    GraphConsistency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Diagnostic {
    FileFailed {
        tag: FileTypeTag,
        path: PathBuf,
        error: String,
    },
    FileExcluded {
        tag: FileTypeTag,
        path: PathBuf,
        error: String,
    },
    MergeRejected {
        tag: FileTypeTag,
        path: PathBuf,
        error: String,
    },
    DuplicateIdentifier {
        entity: EntityKind,
        id: String,
        path: PathBuf,
    },
    DanglingReference(DanglingReference),
    CoverageGap {
        road_id: String,
        path: PathBuf,
        issue: CoverageIssue,
    },
}

impl Diagnostic {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            Diagnostic::FileFailed { .. } => DiagnosticCategory::Structural,
            Diagnostic::FileExcluded { .. } | Diagnostic::MergeRejected { .. } => {
                DiagnosticCategory::Schema
            }
            Diagnostic::DuplicateIdentifier { .. }
            | Diagnostic::DanglingReference(_)
            | Diagnostic::CoverageGap { .. } => DiagnosticCategory::GraphConsistency,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FileFailed { tag, error, .. } => write!(f, "[{tag}] {error}"),
            Diagnostic::FileExcluded { tag, error, .. } => write!(f, "[{tag}] excluded: {error}"),
            Diagnostic::MergeRejected { tag, error, .. } => write!(f, "[{tag}] {error}"),
            Diagnostic::DuplicateIdentifier { entity, id, path } => write!(
                f,
                "duplicate {entity} {id:?} in {} ignored",
                path.display()
            ),
            Diagnostic::DanglingReference(d) => write!(f, "dangling reference: {d}"),
            Diagnostic::CoverageGap {
                road_id,
                path,
                issue,
            } => write!(f, "road {road_id} ({}): {issue}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Loaded,
    Failed,
    Excluded,
}

/// Outcome for one (tag, file) match
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub tag: FileTypeTag,
    pub path: PathBuf,
    pub status: FileStatus,
    pub version: Option<Version>,
    pub kinds: BTreeSet<DataKind>,
}

#[derive(Debug)]
pub struct LoadReport {
    pub base_path: PathBuf,
    pub store: GraphStore,
    /// One folded handler per role, seeded by the highest-priority file of that role
    pub roles: BTreeMap<FileTypeTag, Handler>,
    pub files: Vec<FileRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: StatsSnapshot,
}

/// Serializable overview of a [`LoadReport`]
#[derive(Debug, Serialize)]
pub struct LoadSummary<'a> {
    pub base_path: &'a Path,
    pub roads: usize,
    pub junctions: usize,
    pub roles: Vec<FileTypeTag>,
    pub files: &'a [FileRecord],
    pub stats: StatsSnapshot,
    pub diagnostics: &'a [Diagnostic],
}

impl LoadReport {
    pub fn summary(&self) -> LoadSummary<'_> {
        LoadSummary {
            base_path: &self.base_path,
            roads: self.store.road_count(),
            junctions: self.store.junction_count(),
            roles: self.roles.keys().copied().collect(),
            files: &self.files,
            stats: self.stats,
            diagnostics: &self.diagnostics,
        }
    }

    pub fn diagnostics_in(&self, category: DiagnosticCategory) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.category() == category)
    }
}

/// Imports `base_path` on a dedicated pool when `options.threads` is set,
/// otherwise on the global rayon pool.
pub fn load_folder(base_path: &Path, options: &LoadOptions) -> Result<LoadReport> {
    match options.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("roadnet-worker-{i}"))
                .build()?;
            pool.install(|| run_load(base_path))
        }
        None => run_load(base_path),
    }
}

fn run_load(base_path: &Path) -> Result<LoadReport> {
    let start = Instant::now();
    let stats = ImportStats::new();
    let mut diagnostics = Vec::new();
    let mut files = Vec::new();

    let discovered = discover(base_path)?;
    stats.add_discovered(discovered.len() as u64);

    let mut accepted: Vec<Handler> = Vec::new();
    for found in discovered {
        let handler = match found.handler {
            Ok(handler) => handler,
            Err(e) => {
                stats.inc_failed();
                files.push(FileRecord {
                    tag: found.tag,
                    path: found.path.clone(),
                    status: FileStatus::Failed,
                    version: None,
                    kinds: BTreeSet::new(),
                });
                diagnostics.push(Diagnostic::FileFailed {
                    tag: found.tag,
                    path: found.path,
                    error: e.to_string(),
                });
                continue;
            }
        };
        stats.inc_bound();

        match handler.accepted_version() {
            Ok(version) => {
                files.push(FileRecord {
                    tag: found.tag,
                    path: found.path,
                    status: FileStatus::Loaded,
                    version: Some(version),
                    kinds: handler.extracted_kinds().clone(),
                });
                accepted.push(handler);
            }
            Err(e) => {
                warn!(path = %found.path.display(), error = %e, "Excluding file");
                stats.inc_excluded();
                files.push(FileRecord {
                    tag: found.tag,
                    path: found.path.clone(),
                    status: FileStatus::Excluded,
                    version: handler.declared_version().ok(),
                    kinds: handler.extracted_kinds().clone(),
                });
                diagnostics.push(Diagnostic::FileExcluded {
                    tag: found.tag,
                    path: found.path,
                    error: e.to_string(),
                });
            }
        }
    }

    let mut store = GraphStore::new();
    let sceneries: Vec<(usize, &Path, &SceneryHandler)> = accepted
        .iter()
        .filter_map(|handler| handler.as_scenery().map(|s| (handler.path(), s)))
        .enumerate()
        .map(|(file, (path, scenery))| (file, path, scenery))
        .collect();
    let owners = Owners {
        roads: elect(sceneries.par_iter().flat_map_iter(|&(file, _, scenery)| {
            scenery
                .roads()
                .iter()
                .enumerate()
                .map(move |(i, road)| (road.id.as_str(), (file, i)))
        })),
        junctions: elect(sceneries.par_iter().flat_map_iter(|&(file, _, scenery)| {
            scenery
                .junctions()
                .iter()
                .enumerate()
                .map(move |(i, junction)| (junction.id.as_str(), (file, i)))
        })),
    };
    let population: Vec<Vec<Diagnostic>> = sceneries
        .par_iter()
        .map(|&(file, path, scenery)| populate(&store, &owners, file, path, scenery, &stats))
        .collect();
    diagnostics.extend(population.into_iter().flatten());

    let (resolution, dangling) = store.resolve_links();
    stats.add_links_resolved(resolution.resolved);
    stats.add_dangling(resolution.dangling);
    diagnostics.extend(dangling.into_iter().map(Diagnostic::DanglingReference));

    let roles = fold_roles(accepted, &mut diagnostics);

    let stats = stats.snapshot();
    info!(
        base = %base_path.display(),
        roads = stats.roads_inserted,
        junctions = stats.junctions_inserted,
        diagnostics = diagnostics.len(),
        duration_secs = start.elapsed().as_secs_f64(),
        "Import complete"
    );

    Ok(LoadReport {
        base_path: base_path.to_path_buf(),
        store,
        roles,
        files,
        diagnostics,
        stats,
    })
}

/// Discovery position of an entity: (road network file, entry within the file)
type Origin = (usize, usize);

/// Owning origin of every identifier, decided before any insertion
struct Owners {
    roads: DashMap<String, Origin, FxBuildHasher>,
    junctions: DashMap<String, Origin, FxBuildHasher>,
}

/// The earliest origin claims each identifier, whatever order workers arrive in
fn elect<'a>(
    ids: impl ParallelIterator<Item = (&'a str, Origin)>,
) -> DashMap<String, Origin, FxBuildHasher> {
    let owners = DashMap::with_hasher(FxBuildHasher);
    ids.for_each(|(id, origin)| {
        owners
            .entry(id.to_string())
            .and_modify(|owner: &mut Origin| *owner = (*owner).min(origin))
            .or_insert(origin);
    });
    owners
}

fn owns(owners: &DashMap<String, Origin, FxBuildHasher>, id: &str, origin: Origin) -> bool {
    owners.get(id).is_some_and(|owner| *owner == origin)
}

/// Inserts the entities one road network file owns; runs concurrently with other files.
/// Entries claimed by an earlier file (or an earlier entry of this one) are duplicates.
fn populate(
    store: &GraphStore,
    owners: &Owners,
    file: usize,
    path: &Path,
    scenery: &SceneryHandler,
    stats: &ImportStats,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (i, road) in scenery.roads().iter().enumerate() {
        if !owns(&owners.roads, &road.id, (file, i)) {
            diagnostics.push(duplicate(
                Error::DuplicateIdentifier {
                    kind: EntityKind::Road,
                    id: road.id.clone(),
                },
                path,
                stats,
            ));
            continue;
        }
        let issues = road.coverage_issues();
        match store.insert_road(road.clone()) {
            Ok(()) => {
                stats.inc_roads();
                stats.add_coverage_issues(issues.len() as u64);
                diagnostics.extend(issues.into_iter().map(|issue| Diagnostic::CoverageGap {
                    road_id: road.id.clone(),
                    path: path.to_path_buf(),
                    issue,
                }));
            }
            Err(e) => diagnostics.push(duplicate(e, path, stats)),
        }
    }

    for (i, junction) in scenery.junctions().iter().enumerate() {
        if !owns(&owners.junctions, &junction.id, (file, i)) {
            diagnostics.push(duplicate(
                Error::DuplicateIdentifier {
                    kind: EntityKind::Junction,
                    id: junction.id.clone(),
                },
                path,
                stats,
            ));
            continue;
        }
        match store.insert_junction(junction.clone()) {
            Ok(()) => stats.inc_junctions(),
            Err(e) => diagnostics.push(duplicate(e, path, stats)),
        }
    }

    diagnostics
}

fn duplicate(error: Error, path: &Path, stats: &ImportStats) -> Diagnostic {
    stats.inc_duplicates();
    match error {
        Error::DuplicateIdentifier { kind, id } => {
            warn!(%kind, id = %id, path = %path.display(), "Duplicate identifier");
            Diagnostic::DuplicateIdentifier {
                entity: kind,
                id,
                path: path.to_path_buf(),
            }
        }
        other => Diagnostic::FileFailed {
            tag: FileTypeTag::Scenery,
            path: path.to_path_buf(),
            error: other.to_string(),
        },
    }
}

/// First handler of each role (in priority order) absorbs the rest
fn fold_roles(
    accepted: Vec<Handler>,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<FileTypeTag, Handler> {
    let mut roles: BTreeMap<FileTypeTag, Handler> = BTreeMap::new();
    for handler in accepted {
        let tag = handler.file_type_tag();
        match roles.entry(tag) {
            Entry::Vacant(slot) => {
                slot.insert(handler);
            }
            Entry::Occupied(mut slot) => {
                if let Err(e) = slot.get_mut().merge_from(&handler) {
                    warn!(%tag, error = %e, "Merge rejected");
                    diagnostics.push(Diagnostic::MergeRejected {
                        tag,
                        path: handler.path().to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
    roles
}
