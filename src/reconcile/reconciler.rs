use super::catalog::SegmentCatalog;
use super::diff::SegmentDiff;
use super::options::ReconcileOptions;
use super::validate::validate;
use crate::core::Result;
use crate::topology::{TopologySnapshot, check_port_and_directory_conflicts};
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Drives one reconciliation: load the catalog, diff against the goal, validate,
/// and only then write.
pub struct Reconciler {
    catalog: Arc<dyn SegmentCatalog>,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn SegmentCatalog>) -> Self {
        Self { catalog }
    }

    /// Computes and validates the diff without touching the catalog.
    pub async fn plan(
        &self,
        goal: &TopologySnapshot,
        options: &ReconcileOptions,
    ) -> Result<SegmentDiff> {
        let current = self.catalog.load_current().await?;
        plan_against(&current, goal, options)
    }

    /// Plans, then applies the diff to the catalog if anything changes.
    ///
    /// A rejected plan leaves the catalog untouched. Catalog errors from `apply`
    /// are returned as-is.
    pub async fn reconcile(
        &self,
        goal: &TopologySnapshot,
        options: &ReconcileOptions,
    ) -> Result<SegmentDiff> {
        let diff = self.plan(goal, options).await?;
        if !diff.has_changes() {
            event!(Level::INFO, "segment configuration already matches goal");
            return Ok(diff);
        }

        self.catalog.apply(&diff).await.inspect_err(|err| {
            event!(Level::ERROR, error = %err, "catalog update failed");
        })?;
        event!(Level::INFO, "segment configuration updated");
        Ok(diff)
    }
}

/// Diffs `current` against `goal` and runs every pre-mutation check.
pub fn plan_against(
    current: &TopologySnapshot,
    goal: &TopologySnapshot,
    options: &ReconcileOptions,
) -> Result<SegmentDiff> {
    let span = info_span!(
        "segconf.plan",
        current = current.len(),
        goal = goal.len(),
        utility_mode = options.utility_mode,
        authorized_primary_changes = options.authorized_primary_changes
    );
    let _enter = span.enter();

    let diff = SegmentDiff::compute(current, goal, &options.force_remove_and_add);
    for (name, dbids) in diff.summary().sets() {
        if !dbids.is_empty() {
            event!(Level::DEBUG, set = name, dbids = ?dbids, "classified segments");
        }
    }

    if let Err(err) = validate(
        &diff,
        options.authorized_primary_changes,
        options.utility_mode,
    ) {
        event!(Level::ERROR, rule = ?err.rule(), error = %err, "reconciliation rejected");
        return Err(err.into());
    }

    if options.check_host_conflicts {
        check_port_and_directory_conflicts(diff.final_segments())?;
    }

    event!(
        Level::INFO,
        add_primary = diff.primary_to_add().len(),
        add_mirror = diff.mirror_to_add().len(),
        remove_primary = diff.primary_to_remove().len(),
        remove_mirror = diff.mirror_to_remove().len(),
        remove_and_add = diff.mirror_to_remove_and_add().len(),
        update = diff.segment_to_update().len(),
        "reconciliation plan validated"
    );
    Ok(diff)
}
