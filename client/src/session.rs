//! Per-identifier session state machine.
//!
//! States: `LoggedOut`, `Active`, `AwaitingDeposit`. The session mirrors the
//! server's deposit-progress signal into a client-local [`UnlockState`] and
//! gates a purely local prediction counter the server never sees. Persistence
//! is an injected side effect: every mutation writes through the storage seam
//! immediately, and `logout` clears only the active pointer so progress
//! survives re-login.

use crate::storage::{StorageKeys, UnlockStorage, DEFAULT_PREFIX};
use crate::verifier::Verify;
use crate::{Error, Result};
use predictor_types::{LoginOutcome, UnlockState};
use std::collections::HashMap;
use tracing::{info, warn};

/// Predictions allowed per deposit cycle.
pub const DEFAULT_PREDICTION_LIMIT: u32 = 15;

/// Consecutive not-registered logins before the prompt escalates.
const ESCALATION_THRESHOLD: u32 = 3;

const NOT_REGISTERED_PROMPT: &str = "Sorry, You are Not Registered!\n\
Please click the REGISTER button first and complete your registration using Register Here Button.";

const WAIT_PROMPT: &str = "No registration found yet!\n\
Please wait 2-5 minutes after registration and enter your Player ID again.";

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub prediction_limit: u32,
    /// External affiliate deposit link opened from the limit-reached screen.
    pub affiliate_url: String,
    pub storage_prefix: String,
    /// Qualifying first-deposit minimum, restated in the needs-deposit prompt.
    pub first_deposit_usd: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prediction_limit: DEFAULT_PREDICTION_LIMIT,
            affiliate_url: "https://1waff.com/?p=YOUR_CODE_HERE".to_string(),
            storage_prefix: DEFAULT_PREFIX.to_string(),
            first_deposit_usd: predictor_types::record::DEFAULT_FIRST_DEPOSIT_USD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Active,
    AwaitingDeposit,
}

/// Outcome of a login attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginResult {
    /// Verified; `new_deposit_detected` marks the counter-reset path.
    LoggedIn {
        new_deposit_detected: bool,
        remaining: u32,
    },
    /// Unknown identifier. The prompt escalates after repeated misses.
    NotRegistered { prompt: String, attempts: u32 },
    /// Registered but no qualifying first deposit yet.
    NeedsDeposit { prompt: String },
}

/// Outcome of an app-load resume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeResult {
    NoSession,
    Active { remaining: u32 },
    /// A fresh deposit was confirmed server-side; counter reset.
    DepositConfirmed { remaining: u32 },
    StillAwaiting,
}

/// Outcome of a prediction-consuming action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PredictionOutcome {
    Consumed { used: u32, remaining: u32 },
    /// Allowance exhausted; the session moved to `AwaitingDeposit`.
    LimitReached,
}

pub struct Session<S, V> {
    storage: S,
    verifier: V,
    config: SessionConfig,
    keys: StorageKeys,
    state: SessionState,
    current: Option<UnlockState>,
}

impl<S: UnlockStorage, V: Verify> Session<S, V> {
    pub fn new(storage: S, verifier: V, config: SessionConfig) -> Self {
        let keys = StorageKeys::new(config.storage_prefix.clone());
        Self {
            storage,
            verifier,
            config,
            keys,
            state: SessionState::LoggedOut,
            current: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current(&self) -> Option<&UnlockState> {
        self.current.as_ref()
    }

    fn remaining(&self, record: &UnlockState) -> u32 {
        self.config.prediction_limit.saturating_sub(record.prediction_count)
    }

    fn persist(&mut self, record: &UnlockState) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.storage.set(&self.keys.user(&record.id), &raw)
    }

    fn load_record(&self, id: &str) -> Result<Option<UnlockState>> {
        match self.storage.get(&self.keys.user(id)) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn load_attempts(&self) -> HashMap<String, u32> {
        self.storage
            .get(self.keys.attempts())
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save_attempts(&mut self, attempts: &HashMap<String, u32>) -> Result<()> {
        let raw = serde_json::to_string(attempts)?;
        let key = self.keys.attempts().to_string();
        self.storage.set(&key, &raw)
    }

    /// Log in with an identifier, verifying against the server.
    pub async fn login(&mut self, user_id: &str) -> Result<LoginResult> {
        match self.verifier.verify_login(user_id).await? {
            LoginOutcome::Verified { redeposit_count } => {
                let (mut record, new_deposit_detected) = match self.load_record(user_id)? {
                    Some(mut stored) => {
                        let reset = stored.sync(redeposit_count);
                        (stored, reset)
                    }
                    None => (UnlockState::new(user_id, redeposit_count), false),
                };
                record.awaiting_deposit = false;
                self.persist(&record)?;
                let active_key = self.keys.active();
                self.storage.set(&active_key, user_id)?;

                let mut attempts = self.load_attempts();
                if attempts.remove(user_id).is_some() {
                    self.save_attempts(&attempts)?;
                }

                let remaining = self.remaining(&record);
                if new_deposit_detected {
                    info!(user_id, "new deposit confirmed; prediction count reset");
                }
                self.state = SessionState::Active;
                self.current = Some(record);
                Ok(LoginResult::LoggedIn {
                    new_deposit_detected,
                    remaining,
                })
            }
            LoginOutcome::NotRegistered => {
                let mut attempts = self.load_attempts();
                let count = attempts.entry(user_id.to_string()).or_insert(0);
                *count += 1;
                let count = *count;
                self.save_attempts(&attempts)?;
                let prompt = if count < ESCALATION_THRESHOLD {
                    NOT_REGISTERED_PROMPT
                } else {
                    WAIT_PROMPT
                };
                Ok(LoginResult::NotRegistered {
                    prompt: prompt.to_string(),
                    attempts: count,
                })
            }
            LoginOutcome::RegisteredNoDeposit => Ok(LoginResult::NeedsDeposit {
                prompt: predictor_types::api::needs_deposit_message(self.config.first_deposit_usd),
            }),
        }
    }

    /// Restore the persisted session on app load. When the stored record is
    /// awaiting a deposit, re-verify against the server; a higher redeposit
    /// count confirms the deposit and resets the counter, anything else
    /// (including a verify failure) leaves the stored state untouched.
    pub async fn resume(&mut self) -> Result<ResumeResult> {
        let Some(active_id) = self.storage.get(&self.keys.active()) else {
            self.state = SessionState::LoggedOut;
            self.current = None;
            return Ok(ResumeResult::NoSession);
        };
        let Some(mut record) = self.load_record(&active_id)? else {
            self.state = SessionState::LoggedOut;
            self.current = None;
            return Ok(ResumeResult::NoSession);
        };

        if !record.awaiting_deposit {
            let remaining = self.remaining(&record);
            self.state = SessionState::Active;
            self.current = Some(record);
            return Ok(ResumeResult::Active { remaining });
        }

        match self.verifier.verify_login(&active_id).await {
            Ok(LoginOutcome::Verified { redeposit_count })
                if redeposit_count > record.known_redeposits =>
            {
                record.sync(redeposit_count);
                self.persist(&record)?;
                let remaining = self.remaining(&record);
                info!(user_id = %active_id, "deposit confirmed on resume");
                self.state = SessionState::Active;
                self.current = Some(record);
                Ok(ResumeResult::DepositConfirmed { remaining })
            }
            Ok(_) => {
                self.state = SessionState::AwaitingDeposit;
                self.current = Some(record);
                Ok(ResumeResult::StillAwaiting)
            }
            Err(err) => {
                warn!(user_id = %active_id, error = %err, "re-verify failed; staying locked");
                self.state = SessionState::AwaitingDeposit;
                self.current = Some(record);
                Ok(ResumeResult::StillAwaiting)
            }
        }
    }

    /// Consume one prediction. Exhausting the allowance (or acting while
    /// already exhausted) moves the session to `AwaitingDeposit`.
    pub fn consume_prediction(&mut self) -> Result<PredictionOutcome> {
        let limit = self.config.prediction_limit;
        match self.state {
            SessionState::LoggedOut => Err(Error::NotLoggedIn),
            SessionState::AwaitingDeposit => Ok(PredictionOutcome::LimitReached),
            SessionState::Active => {
                let Some(mut record) = self.current.take() else {
                    return Err(Error::NotLoggedIn);
                };
                if record.prediction_count >= limit {
                    record.awaiting_deposit = true;
                    let persisted = self.persist(&record);
                    self.state = SessionState::AwaitingDeposit;
                    self.current = Some(record);
                    persisted?;
                    return Ok(PredictionOutcome::LimitReached);
                }
                record.prediction_count += 1;
                let persisted = self.persist(&record);
                let used = record.prediction_count;
                let remaining = self.remaining(&record);
                self.current = Some(record);
                persisted?;
                if remaining == 0 {
                    info!(used, "prediction allowance exhausted");
                }
                Ok(PredictionOutcome::Consumed { used, remaining })
            }
        }
    }

    /// User-initiated deposit from the limit-reached screen. Marks the
    /// session awaiting and hands back the affiliate link for the caller to
    /// open (the session does not follow it).
    pub fn request_deposit(&mut self) -> Result<String> {
        let Some(mut record) = self.current.take() else {
            return Err(Error::NotLoggedIn);
        };
        record.awaiting_deposit = true;
        let persisted = self.persist(&record);
        self.state = SessionState::AwaitingDeposit;
        self.current = Some(record);
        persisted?;
        Ok(self.config.affiliate_url.clone())
    }

    /// Clears only the active pointer; the per-identifier record and the
    /// attempt counters stay, so re-login restores prior progress.
    pub fn logout(&mut self) -> Result<()> {
        let active_key = self.keys.active();
        self.storage.remove(&active_key)?;
        self.state = SessionState::LoggedOut;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    /// Scripted verifier: pops outcomes front to back, errors when empty.
    struct ScriptedVerifier {
        outcomes: Mutex<Vec<Result<LoginOutcome>>>,
    }

    impl ScriptedVerifier {
        fn new(outcomes: Vec<Result<LoginOutcome>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }

        fn verified(count: u64) -> Self {
            Self::new(vec![Ok(LoginOutcome::Verified {
                redeposit_count: count,
            })])
        }
    }

    impl Verify for ScriptedVerifier {
        async fn verify_login(&self, _user_id: &str) -> Result<LoginOutcome> {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(Error::UnexpectedResponse);
            }
            outcomes.remove(0)
        }
    }

    fn session(verifier: ScriptedVerifier) -> Session<MemoryStorage, ScriptedVerifier> {
        Session::new(MemoryStorage::default(), verifier, SessionConfig::default())
    }

    fn session_with_storage(
        storage: MemoryStorage,
        verifier: ScriptedVerifier,
    ) -> Session<MemoryStorage, ScriptedVerifier> {
        Session::new(storage, verifier, SessionConfig::default())
    }

    #[tokio::test]
    async fn first_login_creates_state() {
        let mut session = session(ScriptedVerifier::verified(0));
        let result = session.login("u1").await.unwrap();
        assert_eq!(
            result,
            LoginResult::LoggedIn {
                new_deposit_detected: false,
                remaining: 15
            }
        );
        assert_eq!(session.state(), SessionState::Active);
        let record = session.current().unwrap();
        assert_eq!(record.prediction_count, 0);
        assert_eq!(record.known_redeposits, 0);
    }

    #[tokio::test]
    async fn relogin_preserves_progress_without_new_deposit() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::Verified { redeposit_count: 2 }),
            Ok(LoginOutcome::Verified { redeposit_count: 2 }),
        ]));
        session.login("u1").await.unwrap();
        for _ in 0..5 {
            session.consume_prediction().unwrap();
        }
        session.logout().unwrap();

        let result = session.login("u1").await.unwrap();
        assert_eq!(
            result,
            LoginResult::LoggedIn {
                new_deposit_detected: false,
                remaining: 10
            }
        );
    }

    #[tokio::test]
    async fn relogin_resets_on_new_deposit() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::Verified { redeposit_count: 2 }),
            Ok(LoginOutcome::Verified { redeposit_count: 3 }),
        ]));
        session.login("u1").await.unwrap();
        for _ in 0..9 {
            session.consume_prediction().unwrap();
        }

        let result = session.login("u1").await.unwrap();
        assert_eq!(
            result,
            LoginResult::LoggedIn {
                new_deposit_detected: true,
                remaining: 15
            }
        );
        assert_eq!(session.current().unwrap().known_redeposits, 3);
    }

    #[tokio::test]
    async fn not_registered_prompt_escalates_after_three_attempts() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::NotRegistered),
            Ok(LoginOutcome::NotRegistered),
            Ok(LoginOutcome::NotRegistered),
            Ok(LoginOutcome::NotRegistered),
        ]));
        for expected_attempt in 1..=2u32 {
            match session.login("u1").await.unwrap() {
                LoginResult::NotRegistered { prompt, attempts } => {
                    assert_eq!(attempts, expected_attempt);
                    assert!(prompt.contains("Not Registered"));
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
        for expected_attempt in 3..=4u32 {
            match session.login("u1").await.unwrap() {
                LoginResult::NotRegistered { prompt, attempts } => {
                    assert_eq!(attempts, expected_attempt);
                    assert!(prompt.contains("wait 2-5 minutes"));
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(session.state(), SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn successful_login_clears_attempt_counter() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::NotRegistered),
            Ok(LoginOutcome::NotRegistered),
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
            Ok(LoginOutcome::NotRegistered),
        ]));
        session.login("u1").await.unwrap();
        session.login("u1").await.unwrap();
        session.login("u1").await.unwrap();

        // Counter restarted: the next miss is attempt 1 again.
        match session.login("u1").await.unwrap() {
            LoginResult::NotRegistered { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn needs_deposit_leaves_session_logged_out() {
        let mut session = session(ScriptedVerifier::new(vec![Ok(
            LoginOutcome::RegisteredNoDeposit,
        )]));
        match session.login("u1").await.unwrap() {
            LoginResult::NeedsDeposit { prompt } => {
                assert!(prompt.contains("first deposit"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(session.state(), SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn limit_exhaustion_enters_awaiting_deposit() {
        // End-to-end scenario D, client side.
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
        ]));
        session.login("u1").await.unwrap();
        for used in 1..=15u32 {
            match session.consume_prediction().unwrap() {
                PredictionOutcome::Consumed { used: got, .. } => assert_eq!(got, used),
                PredictionOutcome::LimitReached => panic!("limit hit early at {used}"),
            }
        }
        assert_eq!(
            session.consume_prediction().unwrap(),
            PredictionOutcome::LimitReached
        );
        assert_eq!(session.state(), SessionState::AwaitingDeposit);

        // Reload: count unchanged server-side, so still locked.
        assert_eq!(session.resume().await.unwrap(), ResumeResult::StillAwaiting);
        assert_eq!(session.state(), SessionState::AwaitingDeposit);
    }

    #[tokio::test]
    async fn resume_confirms_deposit_and_resets() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
            Ok(LoginOutcome::Verified { redeposit_count: 1 }),
        ]));
        session.login("u1").await.unwrap();
        for _ in 0..15 {
            session.consume_prediction().unwrap();
        }
        session.consume_prediction().unwrap();
        assert_eq!(session.state(), SessionState::AwaitingDeposit);

        assert_eq!(
            session.resume().await.unwrap(),
            ResumeResult::DepositConfirmed { remaining: 15 }
        );
        assert_eq!(session.state(), SessionState::Active);
        let record = session.current().unwrap();
        assert_eq!(record.prediction_count, 0);
        assert_eq!(record.known_redeposits, 1);
        assert!(!record.awaiting_deposit);
    }

    #[tokio::test]
    async fn resume_survives_verify_failure() {
        let mut session = session(ScriptedVerifier::new(vec![Ok(LoginOutcome::Verified {
            redeposit_count: 0,
        })]));
        session.login("u1").await.unwrap();
        for _ in 0..16 {
            session.consume_prediction().unwrap();
        }

        // Verifier script is exhausted: resume sees an error and stays put.
        assert_eq!(session.resume().await.unwrap(), ResumeResult::StillAwaiting);
        assert_eq!(session.current().unwrap().prediction_count, 15);
    }

    /// Storage that rejects writes once its budget is spent.
    struct FlakyStorage {
        inner: MemoryStorage,
        writes_left: usize,
    }

    impl UnlockStorage for FlakyStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.writes_left == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.writes_left -= 1;
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn failed_persist_keeps_the_in_memory_record() {
        // Login issues two writes (record + active pointer); everything
        // after that hits the write failure.
        let storage = FlakyStorage {
            inner: MemoryStorage::default(),
            writes_left: 2,
        };
        let mut session = Session::new(
            storage,
            ScriptedVerifier::verified(0),
            SessionConfig::default(),
        );
        session.login("u1").await.unwrap();

        assert!(session.consume_prediction().is_err());
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.current().unwrap().id, "u1");

        assert!(session.request_deposit().is_err());
        assert!(session.current().is_some());
    }

    #[tokio::test]
    async fn request_deposit_returns_affiliate_link() {
        let mut session = session(ScriptedVerifier::verified(0));
        session.login("u1").await.unwrap();
        let url = session.request_deposit().unwrap();
        assert!(url.starts_with("https://"));
        assert_eq!(session.state(), SessionState::AwaitingDeposit);
        assert!(session.current().unwrap().awaiting_deposit);
    }

    #[tokio::test]
    async fn logout_keeps_the_record() {
        let mut session = session(ScriptedVerifier::new(vec![
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
            Ok(LoginOutcome::Verified { redeposit_count: 0 }),
        ]));
        session.login("u1").await.unwrap();
        for _ in 0..4 {
            session.consume_prediction().unwrap();
        }
        session.logout().unwrap();
        assert_eq!(session.state(), SessionState::LoggedOut);
        assert_eq!(session.resume().await.unwrap(), ResumeResult::NoSession);

        let result = session.login("u1").await.unwrap();
        assert_eq!(
            result,
            LoginResult::LoggedIn {
                new_deposit_detected: false,
                remaining: 11
            }
        );
    }

    #[tokio::test]
    async fn resume_without_pending_deposit_skips_verification() {
        let storage = {
            let mut session = session(ScriptedVerifier::verified(0));
            session.login("u1").await.unwrap();
            session.consume_prediction().unwrap();
            // Steal the storage to rebuild a fresh session from it.
            let Session { storage, .. } = session;
            storage
        };
        // No verifier outcomes scripted: resume must not need one.
        let mut session = session_with_storage(storage, ScriptedVerifier::new(vec![]));
        assert_eq!(
            session.resume().await.unwrap(),
            ResumeResult::Active { remaining: 14 }
        );
    }
}
