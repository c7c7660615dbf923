// Snapshot and vector store consistency
// Compares the processed ward snapshot with the identifiers stored in LanceDB


use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::Result;
use crate::boundaries::WardSet;
use crate::database::lancedb::VectorStore;

/// Differences between the ward snapshot and the vector table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub ward_count: usize,
    pub stored_count: usize,
    /// Wards with no embedding record
    pub missing_in_store: Vec<String>,
    /// Records for wards the snapshot does not contain
    pub orphaned_in_store: Vec<String>,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    /// Compare two identifier lists, order and duplicates ignored
    #[inline]
    pub fn compare(ward_ids: &[String], stored_ids: &[String]) -> Self {
        let wards: BTreeSet<&String> = ward_ids.iter().collect();
        let stored: BTreeSet<&String> = stored_ids.iter().collect();

        let missing_in_store: Vec<String> = wards.difference(&stored).map(|id| (*id).clone()).collect();
        let orphaned_in_store: Vec<String> =
            stored.difference(&wards).map(|id| (*id).clone()).collect();

        let is_consistent = missing_in_store.is_empty() && orphaned_in_store.is_empty();

        Self {
            ward_count: wards.len(),
            stored_count: stored.len(),
            missing_in_store,
            orphaned_in_store,
            is_consistent,
        }
    }

    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Store is consistent: {} wards, {} embedding records",
                self.ward_count, self.stored_count
            )
        } else {
            format!(
                "Store inconsistencies found: {} wards missing from the vector table, {} orphaned records",
                self.missing_in_store.len(),
                self.orphaned_in_store.len()
            )
        }
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.missing_in_store.len() + self.orphaned_in_store.len()
    }
}

/// Check a loaded ward set against the vector store
#[inline]
pub async fn validate_consistency(wards: &WardSet, store: &VectorStore) -> Result<ConsistencyReport> {
    let stored_ids = store.list_ids().await?;
    let report = ConsistencyReport::compare(&wards.ids(), &stored_ids);

    if report.is_consistent {
        info!("{}", report.summary());
    } else {
        warn!("{}", report.summary());
        for id in report.missing_in_store.iter().take(10) {
            warn!("  ward {} has no embedding record", id);
        }
        for id in report.orphaned_in_store.iter().take(10) {
            warn!("  record {} has no ward", id);
        }
    }

    Ok(report)
}
