use crate::errors::CeremonyError;

/// Phase of a single registration ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CeremonyState {
    Idle,
    Preparing,
    AwaitingAuthenticator,
    Finishing,
    Failed,
}

impl CeremonyState {
    fn can_advance_to(self, next: CeremonyState) -> bool {
        use CeremonyState::*;

        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, AwaitingAuthenticator)
                | (AwaitingAuthenticator, Finishing)
                | (Finishing, Idle)
                | (Idle | Preparing | AwaitingAuthenticator | Finishing, Failed)
        )
    }
}

/// Tracks the phase of one ceremony and refuses out-of-order transitions.
#[derive(Debug)]
pub(crate) struct CeremonyTracker {
    state: CeremonyState,
}

impl CeremonyTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: CeremonyState::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CeremonyState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: CeremonyState) -> Result<(), CeremonyError> {
        if !self.state.can_advance_to(next) {
            return Err(CeremonyError::Internal(format!(
                "Ceremony cannot move from {:?} to {:?}",
                self.state, next
            ))
            .log());
        }

        tracing::debug!("Passkey ceremony: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` and hands the error back for propagation.
    pub(crate) fn fail(&mut self, err: CeremonyError) -> CeremonyError {
        if self.state != CeremonyState::Failed {
            tracing::debug!("Passkey ceremony: {:?} -> Failed ({})", self.state, err.kind());
            self.state = CeremonyState::Failed;
        }
        err
    }
}
