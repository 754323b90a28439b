use crate::model::SubjectKind;
use serde::{Deserialize, Serialize};

/// What happens to existing feature values when their origin assignment
/// is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnAssignmentDelete {
    /// Delete the values along with the assignment.
    Cascade,
    /// Keep the values, clearing their assignment reference.
    Detach,
}

/// Per-subject-kind deletion policy. The split between product variants
/// (cascade) and lots (detach, so historical lot data survives template
/// maintenance) is deliberate and configured here rather than buried in
/// storage defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPolicy {
    pub product: OnAssignmentDelete,
    pub lot: OnAssignmentDelete,
}

impl DeletionPolicy {
    pub fn for_kind(&self, kind: SubjectKind) -> OnAssignmentDelete {
        match kind {
            SubjectKind::Product => self.product,
            SubjectKind::Lot => self.lot,
        }
    }
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self {
            product: OnAssignmentDelete::Cascade,
            lot: OnAssignmentDelete::Detach,
        }
    }
}
