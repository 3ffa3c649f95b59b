//! Volume identity reconciliation.
//!
//! Observed volumes are matched against stored records so that one physical
//! medium keeps one record across drive-letter (mount point) changes:
//!
//! 1. same letter, serials equal when both are non-blank;
//! 2. same non-blank serial, any letter;
//! 3. same non-blank label and same total size;
//! 4. otherwise a new record.
//!
//! A stored record is claimed by at most one observation. Planning is pure;
//! [`VolumeReconciler`] applies the plan through an [`IndexStore`] and then
//! backfills model and interface from the physical disks.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use filecensus_core::{
    IndexError, IndexStore, ScanWarning, Volume, VolumeFacts, VolumeId, WarningKind,
};

use crate::enumerator::VolumeEnumerator;

/// Which rule matched an observation to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchRule {
    SameLetter,
    Serial,
    LabelAndSize,
    New,
}

/// Planned outcome for one observed volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAction {
    /// Record to overwrite, `None` to insert.
    pub existing: Option<VolumeId>,
    /// Facts to write.
    pub facts: VolumeFacts,
    pub rule: MatchRule,
}

/// Result of matching observations against stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub actions: Vec<VolumeAction>,
    /// Unclaimed stored records whose letter was taken over.
    pub superseded: Vec<VolumeId>,
}

/// Match `observed` volumes against `stored` records.
///
/// Each rule runs over every observation before the next rule is tried, so
/// an exact serial match is never lost to a weaker match claimed earlier in
/// the list.
pub fn plan(stored: &[Volume], observed: &[VolumeFacts]) -> ReconcilePlan {
    let observed: Vec<VolumeFacts> = observed.iter().map(|f| f.clone().trimmed()).collect();
    let mut matched: Vec<Option<(&Volume, MatchRule)>> = vec![None; observed.len()];
    let mut claimed: HashSet<VolumeId> = HashSet::new();

    let passes: [(MatchRule, fn(&Volume, &VolumeFacts) -> bool); 4] = [
        (MatchRule::SameLetter, same_letter_same_serial),
        (MatchRule::Serial, same_serial),
        (MatchRule::SameLetter, same_letter_blank_serial),
        (MatchRule::LabelAndSize, same_label_and_size),
    ];
    for (rule, is_match) in passes {
        for (slot, facts) in matched.iter_mut().zip(&observed) {
            if slot.is_some() {
                continue;
            }
            if let Some(volume) = stored
                .iter()
                .find(|v| !claimed.contains(&v.id) && is_match(v, facts))
            {
                claimed.insert(volume.id);
                *slot = Some((volume, rule));
            }
        }
    }

    let mut taken_letters: Vec<&str> = Vec::new();
    let mut actions = Vec::with_capacity(observed.len());
    for (found, facts) in matched.into_iter().zip(observed.iter()) {
        let action = match found {
            Some((volume, rule)) => {
                if matches!(rule, MatchRule::Serial | MatchRule::LabelAndSize) {
                    taken_letters.push(&facts.letter);
                }
                VolumeAction {
                    existing: Some(volume.id),
                    facts: merge(volume, facts.clone()),
                    rule,
                }
            }
            None => VolumeAction {
                existing: None,
                facts: facts.clone(),
                rule: MatchRule::New,
            },
        };
        actions.push(action);
    }

    let superseded = stored
        .iter()
        .filter(|volume| !claimed.contains(&volume.id))
        .filter(|volume| {
            taken_letters
                .iter()
                .any(|letter| volume.facts.same_letter(letter))
        })
        .map(|volume| volume.id)
        .collect();

    ReconcilePlan {
        actions,
        superseded,
    }
}

fn same_letter_same_serial(stored: &Volume, facts: &VolumeFacts) -> bool {
    stored.facts.same_letter(&facts.letter) && same_serial(stored, facts)
}

fn same_serial(stored: &Volume, facts: &VolumeFacts) -> bool {
    !facts.serial.is_empty() && stored.facts.serial.trim() == facts.serial
}

fn same_letter_blank_serial(stored: &Volume, facts: &VolumeFacts) -> bool {
    stored.facts.same_letter(&facts.letter)
        && (stored.facts.serial.trim().is_empty() || facts.serial.is_empty())
}

fn same_label_and_size(stored: &Volume, facts: &VolumeFacts) -> bool {
    !facts.label.is_empty()
        && stored.facts.label.trim() == facts.label
        && stored.facts.total_size == facts.total_size
}

/// Observed facts overwrite the stored record; a blank observed model keeps
/// the stored one.
fn merge(stored: &Volume, mut observed: VolumeFacts) -> VolumeFacts {
    if observed.model.is_empty() {
        observed.model = stored.facts.model.clone();
    }
    observed
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// The working set: one record per observed volume.
    pub active: Vec<Volume>,
    pub superseded: Vec<VolumeId>,
    pub created: usize,
    pub reused: usize,
    /// Records whose model or interface was backfilled from a disk.
    pub enriched: usize,
    pub warnings: Vec<ScanWarning>,
}

/// Reconciles enumerated volumes with the store.
pub struct VolumeReconciler<'a, S: ?Sized, E: ?Sized> {
    store: &'a S,
    enumerator: &'a E,
}

impl<'a, S, E> VolumeReconciler<'a, S, E>
where
    S: IndexStore + ?Sized,
    E: VolumeEnumerator + ?Sized,
{
    pub fn new(store: &'a S, enumerator: &'a E) -> Self {
        Self { store, enumerator }
    }

    /// Match, persist, then enrich. Only store errors propagate.
    pub fn reconcile(&self) -> Result<Reconciliation, IndexError> {
        let mut result = Reconciliation::default();

        let stored = self.store.list_volumes()?;
        let observed = match self.enumerator.list_volumes() {
            Ok(observed) => observed,
            Err(error) => {
                warn!(%error, "Volume enumeration failed");
                result
                    .warnings
                    .push(ScanWarning::from_error("", &error));
                Vec::new()
            }
        };

        let plan = plan(&stored, &observed);
        for action in plan.actions {
            let id = self.store.upsert_volume(action.existing, &action.facts)?;
            match action.existing {
                Some(_) => {
                    result.reused += 1;
                    debug!(volume = id.0, letter = %action.facts.letter, rule = ?action.rule, "Reused volume");
                }
                None => {
                    result.created += 1;
                    info!(volume = id.0, letter = %action.facts.letter, "New volume");
                }
            }
            result.active.push(Volume::new(id, action.facts));
        }

        for id in &plan.superseded {
            info!(volume = id.0, "Volume superseded");
        }
        result.superseded = plan.superseded;

        self.enrich(&mut result)?;
        Ok(result)
    }

    /// Backfill model and interface from the physical disks. Never creates
    /// records.
    fn enrich(&self, result: &mut Reconciliation) -> Result<(), IndexError> {
        let disks = match self.enumerator.physical_disks() {
            Ok(disks) => disks,
            Err(error) => {
                warn!(%error, "Physical disk enumeration failed, skipping enrichment");
                result.warnings.push(ScanWarning::from_error("", &error));
                return Ok(());
            }
        };

        for disk in disks {
            let letters = match self.enumerator.letters_for_disk(&disk) {
                Ok(letters) => letters,
                Err(error) => {
                    warn!(disk = %disk.name, %error, "Disk association failed");
                    result.warnings.push(ScanWarning::new(
                        &disk.name,
                        error.to_string(),
                        WarningKind::Enumeration,
                    ));
                    continue;
                }
            };

            for letter in letters {
                let Some(volume) = result
                    .active
                    .iter_mut()
                    .find(|v| v.facts.same_letter(&letter))
                else {
                    continue;
                };
                let mut facts = volume.facts.clone();
                if !disk.model.trim().is_empty() {
                    facts.model = disk.model.trim().to_string();
                }
                if !disk.interface.trim().is_empty() {
                    facts.drive_type = disk.interface.trim().to_string();
                }
                if facts == volume.facts {
                    continue;
                }
                self.store.upsert_volume(Some(volume.id), &facts)?;
                debug!(volume = volume.id.0, disk = %disk.name, "Enriched volume");
                volume.facts = facts;
                result.enriched += 1;
            }
        }
        Ok(())
    }
}
