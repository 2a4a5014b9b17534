use thiserror::Error;

use crate::domain::Selector;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TourError {
    #[error("tour target not found for step {step}: {target}")]
    TargetNotFound { step: usize, target: Selector },
    #[error("tour step catalog is empty")]
    EmptyCatalog,
}

impl TourError {
    pub fn target_not_found(step: usize, target: &Selector) -> Self {
        Self::TargetNotFound {
            step,
            target: target.clone(),
        }
    }

    pub fn is_target_not_found(&self) -> bool {
        matches!(self, Self::TargetNotFound { .. })
    }
}
