//! Volume enumeration and identity reconciliation for filecensus.
//!
//! A [`VolumeEnumerator`] reports what is mounted right now; the
//! [`VolumeReconciler`] folds those observations into the stored volume
//! records and returns the working set for a run.

mod enumerator;
mod reconcile;
mod sysfs;

pub use enumerator::{PhysicalDisk, StaticEnumerator, VolumeEnumerator};
pub use reconcile::{
    MatchRule, ReconcilePlan, Reconciliation, VolumeAction, VolumeReconciler, plan,
};
pub use sysfs::{MountEntry, SysfsEnumerator, parse_mounts};
