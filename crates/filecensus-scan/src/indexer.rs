//! One complete indexing run: reconcile, register, walk every root.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::{info, warn};

use filecensus_core::{IndexConfig, IndexError, IndexStore, ScanWarning, WalkReport, WalkStats};
use filecensus_volume::{Reconciliation, VolumeEnumerator, VolumeReconciler};

use crate::catalog::AttributeCatalog;
use crate::context::ScanContext;
use crate::progress::ScanProgress;
use crate::provider::AttributeProvider;
use crate::walker::IndexWalker;

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct IndexSummary {
    pub reconciliation: Reconciliation,
    /// One report per root that could be walked.
    pub reports: Vec<WalkReport>,
    /// Roots that could not be walked at all.
    pub root_warnings: Vec<ScanWarning>,
}

impl IndexSummary {
    /// Counters summed over every root.
    pub fn totals(&self) -> WalkStats {
        let mut totals = WalkStats::new();
        for report in &self.reports {
            totals.merge(&report.stats);
        }
        totals
    }

    /// Warnings from reconciliation, roots and walks.
    pub fn warning_count(&self) -> usize {
        self.reconciliation.warnings.len()
            + self.root_warnings.len()
            + self
                .reports
                .iter()
                .map(|report| report.warnings.len())
                .sum::<usize>()
    }
}

/// Drives a run over the configured roots.
pub struct Indexer<'a, S: ?Sized, E: ?Sized, P> {
    store: &'a S,
    enumerator: &'a E,
    walker: IndexWalker<'a, S, P>,
    roots: Vec<PathBuf>,
}

impl<'a, S, E, P> Indexer<'a, S, E, P>
where
    S: IndexStore + ?Sized,
    E: VolumeEnumerator + ?Sized,
    P: AttributeProvider,
{
    pub fn new(
        store: &'a S,
        enumerator: &'a E,
        provider: &'a P,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(Self {
            store,
            enumerator,
            walker: IndexWalker::new(store, provider, config)?,
            roots: config.roots.clone(),
        })
    }

    /// Subscribe to walk progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.walker.subscribe()
    }

    /// Run the whole pass. Only fatal errors are returned; a root that
    /// cannot be walked becomes a warning.
    pub fn run(&self) -> Result<IndexSummary, IndexError> {
        self.store.create_schema()?;

        let reconciliation = VolumeReconciler::new(self.store, self.enumerator).reconcile()?;
        info!(
            active = reconciliation.active.len(),
            created = reconciliation.created,
            reused = reconciliation.reused,
            superseded = reconciliation.superseded.len(),
            "Volumes reconciled"
        );

        let names = self.walker.provider().attribute_names();
        let catalog = AttributeCatalog::register(self.store, &names)?;
        let mut ctx = ScanContext::new(reconciliation.active.clone(), catalog);

        let mut summary = IndexSummary {
            reconciliation,
            ..IndexSummary::default()
        };
        for root in &self.roots {
            match self.walk_root(&mut ctx, root) {
                Ok(report) => summary.reports.push(report),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(root = %root.display(), %error, "Root not indexed");
                    summary
                        .root_warnings
                        .push(ScanWarning::from_error(root, &error));
                }
            }
        }
        Ok(summary)
    }

    fn walk_root(&self, ctx: &mut ScanContext, root: &Path) -> Result<WalkReport, IndexError> {
        let root = root.canonicalize().map_err(|e| IndexError::io(root, e))?;
        let volume = ctx
            .volume_for(&root)
            .cloned()
            .ok_or_else(|| IndexError::VolumeNotFound { path: root.clone() })?;
        self.walker.walk(ctx, &volume, &root)
    }
}
