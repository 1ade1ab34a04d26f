use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseId {
    /// Listener wildcard: matches every phase
    Any,
    Restore,
    ApplyInput,
    ProcessValidations,
    UpdateModel,
    InvokeApplication,
    Render,
}

impl PhaseId {
    /// Phases run by `Lifecycle::execute`, in order. `Render` runs separately.
    pub const EXECUTE: [PhaseId; 5] = [
        PhaseId::Restore,
        PhaseId::ApplyInput,
        PhaseId::ProcessValidations,
        PhaseId::UpdateModel,
        PhaseId::InvokeApplication,
    ];

    /// Does a listener registered for `self` fire for `phase`?
    pub fn matches(self, phase: PhaseId) -> bool {
        self == PhaseId::Any || self == phase
    }

    pub fn name(self) -> &'static str {
        match self {
            PhaseId::Any => "ANY",
            PhaseId::Restore => "RESTORE",
            PhaseId::ApplyInput => "APPLY_INPUT",
            PhaseId::ProcessValidations => "PROCESS_VALIDATIONS",
            PhaseId::UpdateModel => "UPDATE_MODEL",
            PhaseId::InvokeApplication => "INVOKE_APPLICATION",
            PhaseId::Render => "RENDER",
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
