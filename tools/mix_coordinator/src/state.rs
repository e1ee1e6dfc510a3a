//! Session records and their status machine.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixStatus {
    AwaitingDeposit,
    DepositDetected,
    Processing,
    Completed,
    Expired,
    Failed,
}

impl MixStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingDeposit => "awaiting_deposit",
            Self::DepositDetected => "deposit_detected",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One custodial relay session. Never deleted; terminal records are kept
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixSession {
    pub id: String,
    pub user_wallet: String,
    /// Expected deposit amount. Used for matching only; the payout is
    /// computed from the actual on-chain balance.
    pub amount_sol: f64,
    pub status: MixStatus,
    pub deposit_address: String,
    /// Raw 64-byte keypair blob. At-rest encryption is a deployment
    /// concern; see DESIGN.md.
    pub deposit_secret_encrypted: Vec<u8>,
    pub output_address: Option<String>,
    pub output_secret: Option<Vec<u8>>,
    pub tx_signature_in: Option<String>,
    pub tx_signature_out: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub deposit_detected_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl MixSession {
    pub fn new(
        id: String,
        user_wallet: String,
        amount_sol: f64,
        deposit_address: String,
        deposit_secret: Vec<u8>,
        created_at: i64,
        ttl_secs: i64,
    ) -> Self {
        Self {
            id,
            user_wallet,
            amount_sol,
            status: MixStatus::AwaitingDeposit,
            deposit_address,
            deposit_secret_encrypted: deposit_secret,
            output_address: None,
            output_secret: None,
            tx_signature_in: None,
            tx_signature_out: None,
            created_at,
            expires_at: created_at + ttl_secs,
            deposit_detected_at: None,
            completed_at: None,
        }
    }

    pub fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
