//! Shared result-bundle cell: many readers, one in-flight rebuild.
//!
//! Downstream consumers read whatever bundle is current; a re-analysis
//! builds a fresh bundle privately and swaps it in atomically, so readers
//! always hold a fully consistent snapshot. At most one rebuild may be in
//! flight - a second attempt is rejected, not queued.

use crate::pipeline::ResultBundle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A rebuild was requested while another one is still in flight.
#[derive(Debug, Clone, Error)]
#[error("a result rebuild is already in progress")]
pub struct RebuildInProgress;

/// Holds the latest analysis bundle behind an atomic swap.
#[derive(Debug, Default)]
pub struct BundleCell {
    current: RwLock<Option<Arc<ResultBundle>>>,
    rebuilding: AtomicBool,
}

impl BundleCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published bundle, if any analysis has completed.
    pub fn load(&self) -> Option<Arc<ResultBundle>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Begin a rebuild. The returned guard publishes a new bundle via
    /// `commit`; dropping it without committing (e.g. the rebuild failed)
    /// releases the in-flight flag and leaves the current bundle intact.
    pub fn begin_rebuild(&self) -> Result<RebuildGuard<'_>, RebuildInProgress> {
        if self.rebuilding.swap(true, Ordering::AcqRel) {
            return Err(RebuildInProgress);
        }
        Ok(RebuildGuard { cell: self })
    }
}

/// Exclusive permission to publish the next bundle.
pub struct RebuildGuard<'a> {
    cell: &'a BundleCell,
}

impl RebuildGuard<'_> {
    /// Atomically publish a freshly built bundle.
    pub fn commit(self, bundle: ResultBundle) {
        let next = Some(Arc::new(bundle));
        match self.cell.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        // The in-flight flag clears when `self` drops.
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.cell.rebuilding.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::pipeline::analyze;
    use crate::record::{EventType, FeatureRecord, IdOd, Run};
    use std::collections::BTreeMap;

    fn weld(row: usize, joint: i64, distance: f64) -> FeatureRecord {
        FeatureRecord {
            joint_number: Some(joint),
            log_distance_ft: distance,
            elevation_ft: f64::NAN,
            event_type: EventType::GirthWeld,
            depth_pct: f64::NAN,
            depth_in: f64::NAN,
            length_in: f64::NAN,
            width_in: f64::NAN,
            clock_hours: f64::NAN,
            id_od: IdOd::Unknown,
            wall_thickness_in: f64::NAN,
            comments: None,
            source_row_idx: row,
        }
    }

    fn bundle() -> ResultBundle {
        let mut runs = BTreeMap::new();
        runs.insert(2015, Run::new(2015, vec![weld(0, 1, 100.0), weld(1, 2, 140.0)]));
        runs.insert(2022, Run::new(2022, vec![weld(0, 1, 101.0), weld(1, 2, 141.0)]));
        analyze(runs, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_cell_loads_none() {
        let cell = BundleCell::new();
        assert!(cell.load().is_none());
    }

    #[test]
    fn test_commit_publishes() {
        let cell = BundleCell::new();
        let guard = cell.begin_rebuild().unwrap();
        guard.commit(bundle());
        let loaded = cell.load().unwrap();
        assert_eq!(loaded.runs.len(), 2);
    }

    #[test]
    fn test_second_rebuild_rejected_until_first_finishes() {
        let cell = BundleCell::new();
        let guard = cell.begin_rebuild().unwrap();
        assert!(cell.begin_rebuild().is_err());
        guard.commit(bundle());
        // Finished: a new rebuild may begin
        assert!(cell.begin_rebuild().is_ok());
    }

    #[test]
    fn test_abandoned_rebuild_keeps_previous_bundle() {
        let cell = BundleCell::new();
        cell.begin_rebuild().unwrap().commit(bundle());

        {
            let _guard = cell.begin_rebuild().unwrap();
            // Rebuild fails and the guard drops without committing
        }
        assert!(cell.load().is_some());
        assert!(cell.begin_rebuild().is_ok());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cell = BundleCell::new();
        cell.begin_rebuild().unwrap().commit(bundle());
        let snapshot = cell.load().unwrap();

        cell.begin_rebuild().unwrap().commit(bundle());
        // The old snapshot is still whole and readable
        assert_eq!(snapshot.runs.len(), 2);
    }
}
