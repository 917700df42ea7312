use predictor_types::UnlockState;

/// Whether the game is playable, derived purely from the local unlock state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Unlocked { remaining: u32 },
    /// Allowance exhausted or a deposit confirmation is pending.
    Locked,
}

pub fn evaluate(state: &UnlockState, limit: u32) -> GateDecision {
    if state.awaiting_deposit || state.prediction_count >= limit {
        GateDecision::Locked
    } else {
        GateDecision::Unlocked {
            remaining: limit - state.prediction_count,
        }
    }
}
