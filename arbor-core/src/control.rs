//! Per-run process control: which stage triggered the run, which aspects of
//! the tree changed, and what kind of output the run is for.

use bitflags::bitflags;

use crate::types::StageId;

bitflags! {
    /// Facets of the tree a stage run can alter.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ChangedAspects: u32 {
        const STRUCTURE = 1;
        const POSITION = 1 << 1;
        const GIRTH = 1 << 2;
        const LENGTH = 1 << 3;
        const BEND_POINTS = 1 << 4;
        const MESH = 1 << 5;
        const MATERIAL = 1 << 6;
    }
}

/// What the processed tree is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ProcessType {
    #[default]
    Preview,
    Runtime,
    Prefab,
}

/// Record for one processing run; created fresh per run and dropped at its
/// end.
#[derive(Clone, Debug)]
pub struct ProcessControl {
    /// Stage that triggered the run, if any.
    pub trigger: Option<StageId>,
    /// Aspects altered so far, accumulated as processors run.
    pub changed: ChangedAspects,
    /// Aspects no processor may recompute this run.
    pub locked: ChangedAspects,
    pub process_type: ProcessType,
    pub lod_index: usize,
}

impl ProcessControl {
    pub fn new(trigger: Option<StageId>, process_type: ProcessType, lod_index: usize) -> Self {
        Self {
            trigger,
            changed: ChangedAspects::empty(),
            locked: ChangedAspects::empty(),
            process_type,
            lod_index,
        }
    }

    /// ORs a processor's reported aspects into the run record.
    pub fn add_changed(&mut self, aspects: ChangedAspects) {
        self.changed |= aspects;
    }

    pub fn lock(&mut self, aspects: ChangedAspects) {
        self.locked |= aspects;
    }

    pub fn is_locked(&self, aspects: ChangedAspects) -> bool {
        self.locked.intersects(aspects)
    }

    pub fn has_changed(&self, aspects: ChangedAspects) -> bool {
        self.changed.intersects(aspects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_aspects_accumulate() {
        let mut control = ProcessControl::new(None, ProcessType::Preview, 0);
        assert!(!control.has_changed(ChangedAspects::STRUCTURE));
        control.add_changed(ChangedAspects::STRUCTURE);
        control.add_changed(ChangedAspects::GIRTH);
        assert!(control.has_changed(ChangedAspects::STRUCTURE));
        assert!(control.has_changed(ChangedAspects::GIRTH));
        assert!(!control.has_changed(ChangedAspects::MESH));
    }

    #[test]
    fn locking_is_queryable_per_aspect() {
        let mut control = ProcessControl::new(Some(2), ProcessType::Prefab, 1);
        control.lock(ChangedAspects::LENGTH);
        assert!(control.is_locked(ChangedAspects::LENGTH));
        assert!(!control.is_locked(ChangedAspects::GIRTH));
        assert_eq!(control.trigger, Some(2));
        assert_eq!(control.lod_index, 1);
    }
}
