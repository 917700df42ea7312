pub mod api;
pub mod record;
pub mod unlock;

pub use api::{ErrorCode, ErrorResponse, LoginOutcome, PostbackResponse, VerifyLoginResponse};
pub use record::{DepositRecord, PostbackStatus, Thresholds};
pub use unlock::UnlockState;
