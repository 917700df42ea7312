use serde::{Deserialize, Serialize};

/// Client-local unlock progress for one identifier.
///
/// An optimistic mirror of the server's deposit-progress signal: the server
/// only knows `known_redeposits`; the prediction counter and the
/// awaiting-deposit flag live entirely on the client. Serialized as
/// camelCase JSON so stored records from the original web client round-trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockState {
    pub id: String,
    /// Predictions consumed in the current deposit cycle.
    pub prediction_count: u32,
    /// Set when the limit was exhausted locally and the client is waiting
    /// for a fresh deposit to be confirmed server-side.
    pub awaiting_deposit: bool,
    /// Last `redepositCount` observed from the server. Monotonic: the
    /// server never decreases it, so neither does the client.
    pub known_redeposits: u64,
}

impl UnlockState {
    pub fn new(id: impl Into<String>, known_redeposits: u64) -> Self {
        Self {
            id: id.into(),
            prediction_count: 0,
            awaiting_deposit: false,
            known_redeposits,
        }
    }

    /// Fold a freshly observed server count into the local record. Returns
    /// true when a new qualifying deposit was detected (counter reset).
    pub fn sync(&mut self, server_redeposits: u64) -> bool {
        if server_redeposits > self.known_redeposits {
            self.prediction_count = 0;
            self.awaiting_deposit = false;
            self.known_redeposits = server_redeposits;
            true
        } else {
            self.awaiting_deposit = false;
            self.known_redeposits = self.known_redeposits.max(server_redeposits);
            false
        }
    }
}
