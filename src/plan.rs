//! Resolve which classes a job trains and where each model is written.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    classes::SemanticClass,
    mask::{ClassMasks, GroundTruth},
};

/// Model destinations declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSlots {
    pub background: PathBuf,
    pub symbols: PathBuf,
    pub staff: Option<PathBuf>,
    pub text: Option<PathBuf>,
}

impl ModelSlots {
    /// Destination for `class`, if one was declared.
    pub fn destination(&self, class: SemanticClass) -> Option<&Path> {
        match class {
            SemanticClass::Background => Some(&self.background),
            SemanticClass::Symbols => Some(&self.symbols),
            SemanticClass::Staff => self.staff.as_deref(),
            SemanticClass::Text => self.text.as_deref(),
        }
    }

    pub fn has(&self, class: SemanticClass) -> bool {
        self.destination(class).is_some()
    }
}

/// One class to train: its labels and its artifact destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub ground_truth: GroundTruth,
    pub destination: PathBuf,
}

/// Classes to train for one job, ordered by class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPlan {
    entries: BTreeMap<SemanticClass, PlanEntry>,
}

impl ClassPlan {
    /// Pair derived masks with declared destinations.
    ///
    /// Required classes are always planned. An optional class is planned only when its
    /// layer was supplied and its model slot was declared; one-sided presence drops it.
    pub fn build(mut masks: ClassMasks, slots: &ModelSlots) -> Self {
        let mut entries = BTreeMap::new();
        for class in SemanticClass::OPTIONAL {
            let has_layer = masks.has(class);
            let has_slot = slots.has(class);
            if has_layer != has_slot {
                tracing::debug!(
                    "Skipping {class}: layer supplied = {has_layer}, model slot declared = {has_slot}"
                );
            }
        }
        for class in SemanticClass::REQUIRED.into_iter().chain(SemanticClass::OPTIONAL) {
            if let (Some(ground_truth), Some(destination)) =
                (masks.take(class), slots.destination(class))
            {
                entries.insert(
                    class,
                    PlanEntry {
                        ground_truth,
                        destination: destination.to_path_buf(),
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn classes(&self) -> impl Iterator<Item = SemanticClass> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (SemanticClass, &PlanEntry)> {
        self.entries.iter().map(|(class, entry)| (*class, entry))
    }

    pub fn get(&self, class: SemanticClass) -> Option<&PlanEntry> {
        self.entries.get(&class)
    }

    pub fn contains(&self, class: SemanticClass) -> bool {
        self.entries.contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
