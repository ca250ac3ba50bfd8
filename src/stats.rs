use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected while importing a scenario folder
#[derive(Default)]
pub struct ImportStats {
    pub files_discovered: AtomicU64,
    pub files_bound: AtomicU64,
    pub files_failed: AtomicU64,
    pub files_excluded: AtomicU64,
    pub roads_inserted: AtomicU64,
    pub junctions_inserted: AtomicU64,
    pub duplicates: AtomicU64,
    pub links_resolved: AtomicU64,
    pub dangling_references: AtomicU64,
    pub coverage_issues: AtomicU64,
}

/// Plain copy of [`ImportStats`] for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files_discovered: u64,
    pub files_bound: u64,
    pub files_failed: u64,
    pub files_excluded: u64,
    pub roads_inserted: u64,
    pub junctions_inserted: u64,
    pub duplicates: u64,
    pub links_resolved: u64,
    pub dangling_references: u64,
    pub coverage_issues: u64,
}

impl ImportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovered(&self, count: u64) {
        self.files_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_bound(&self) {
        self.files_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_excluded(&self) {
        self.files_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_roads(&self) {
        self.roads_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_junctions(&self) {
        self.junctions_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links_resolved(&self, count: u64) {
        self.links_resolved.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_dangling(&self, count: u64) {
        self.dangling_references.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_coverage_issues(&self, count: u64) {
        self.coverage_issues.fetch_add(count, Ordering::Relaxed);
    }

    pub fn roads(&self) -> u64 {
        self.roads_inserted.load(Ordering::Relaxed)
    }

    pub fn junctions(&self) -> u64 {
        self.junctions_inserted.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            files_bound: self.files_bound.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_excluded: self.files_excluded.load(Ordering::Relaxed),
            roads_inserted: self.roads(),
            junctions_inserted: self.junctions(),
            duplicates: self.duplicates(),
            links_resolved: self.links_resolved.load(Ordering::Relaxed),
            dangling_references: self.dangling_references.load(Ordering::Relaxed),
            coverage_issues: self.coverage_issues.load(Ordering::Relaxed),
        }
    }
}
