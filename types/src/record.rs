use serde::{Deserialize, Serialize};

/// Default minimum first deposit (USD) that unlocks predictions.
pub const DEFAULT_FIRST_DEPOSIT_USD: f64 = 5.0;

/// Default minimum repeat deposit (USD) that counts toward a new unlock cycle.
pub const DEFAULT_REDEPOSIT_USD: f64 = 4.0;

/// Server-side deposit progress for a single affiliate-tracked user.
///
/// Created implicitly by the first postback event for an identifier and
/// mutated in place by later events. `has_first_deposit` is never unset and
/// `redeposit_count` never decreases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub id: String,
    pub has_first_deposit: bool,
    pub redeposit_count: u64,
}

impl DepositRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            has_first_deposit: false,
            redeposit_count: 0,
        }
    }
}

/// Event kind reported by the affiliate network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostbackStatus {
    /// User completed affiliate registration.
    #[serde(rename = "registration")]
    Registration,
    /// First deposit, amount carried in `fdp_usd`.
    #[serde(rename = "fdp")]
    FirstDeposit,
    /// Repeat deposit, amount carried in `dep_sum_usd`.
    #[serde(rename = "dep")]
    Redeposit,
}

impl PostbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostbackStatus::Registration => "registration",
            PostbackStatus::FirstDeposit => "fdp",
            PostbackStatus::Redeposit => "dep",
        }
    }
}

/// Qualification thresholds for deposit events. Policy constants, not
/// protocol requirements: overridable via server configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub first_deposit_usd: f64,
    pub redeposit_usd: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            first_deposit_usd: DEFAULT_FIRST_DEPOSIT_USD,
            redeposit_usd: DEFAULT_REDEPOSIT_USD,
        }
    }
}

impl Thresholds {
    pub fn qualifies_first_deposit(&self, amount_usd: f64) -> bool {
        amount_usd >= self.first_deposit_usd
    }

    pub fn qualifies_redeposit(&self, amount_usd: f64) -> bool {
        amount_usd >= self.redeposit_usd
    }
}

/// Parse an amount reported by the affiliate network. Partner integrations
/// are sloppy, so a missing or malformed value becomes 0.0 and simply fails
/// the threshold instead of erroring the request.
pub fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
