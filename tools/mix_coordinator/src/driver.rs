//! Mix-session state machine driver.
//!
//! All chain access goes through the [`ChainClient`] trait so tests can
//! substitute scripted gateways, and every status change goes through the
//! store's compare-and-set so concurrent callers cannot double-advance a
//! session.

use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sol_wallet::{
    build_transfer, decode_address, Blockhash, DepositWatcher, ParsedTransaction, SecretKey,
    SignatureInfo,
};

use crate::config::MixConfig;
use crate::db::{SessionDb, SessionUpdate, Transition};
use crate::metrics::SessionMetrics;
use crate::state::{MixSession, MixStatus};

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn balance(&self, address: &str) -> Result<u64>;
    async fn latest_blockhash(&self) -> Result<Blockhash>;
    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;
    async fn transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>>;
    async fn submit_transaction(&self, signed_tx_base64: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum MixError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Session not found")]
    SessionNotFound,
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid status: {0}")]
    InvalidStatus(MixStatus),
    #[error("chain rpc failure: {0}")]
    ChainRpc(String),
    #[error("Insufficient balance for transfer")]
    InsufficientBalance,
    #[error("Transaction failed: {0}")]
    SubmissionFailed(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    /// Nothing matched yet; the session is still awaiting its deposit.
    Pending,
    /// This call matched the incoming transfer and advanced the session.
    Detected {
        signature: String,
        lamports_received: u64,
    },
    /// A previous call already advanced the session; its stored result.
    Already {
        status: MixStatus,
        signature: Option<String>,
    },
    Expired,
}

#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub output_address: String,
    pub output_secret: Vec<u8>,
    pub tx_signature_out: String,
    /// Only known on the call that actually submitted the transfer;
    /// replayed receipts omit it.
    pub lamports_transferred: Option<u64>,
}

/// Creates a session in `awaiting_deposit` with a freshly generated
/// deposit keypair and a TTL-bound expiry.
pub fn create_session<D>(
    db: &D,
    config: &MixConfig,
    user_wallet: &str,
    amount_sol: f64,
    now_unix: i64,
) -> Result<MixSession, MixError>
where
    D: SessionDb + ?Sized,
{
    if user_wallet.is_empty() || decode_address(user_wallet).is_err() {
        return Err(MixError::InvalidInput("Invalid user wallet".to_string()));
    }
    if !config.amount_in_bounds(amount_sol) {
        return Err(MixError::InvalidInput(format!(
            "Amount must be between {} and {} SOL",
            config.min_amount_sol, config.max_amount_sol
        )));
    }

    let deposit = SecretKey::generate();
    let session = MixSession::new(
        Uuid::new_v4().to_string(),
        user_wallet.to_string(),
        amount_sol,
        deposit.address(),
        deposit.to_bytes().to_vec(),
        now_unix,
        config.session_ttl_secs,
    );
    db.create(&session)?;

    info!(
        session_id = %session.id,
        deposit_address = %session.deposit_address,
        amount_sol,
        "mix session created"
    );
    Ok(session)
}

/// Polls the chain for the session's incoming transfer. Expiry is checked
/// first; transient RPC failures leave the session untouched so a later
/// poll can retry.
pub async fn detect_deposit<D, C, M>(
    db: &D,
    client: &C,
    metrics: &M,
    config: &MixConfig,
    session_id: &str,
    now_unix: i64,
) -> Result<DetectOutcome, MixError>
where
    D: SessionDb + ?Sized,
    C: ChainClient + ?Sized,
    M: SessionMetrics + ?Sized,
{
    let session = db.get(session_id)?.ok_or(MixError::SessionNotFound)?;

    match session.status {
        MixStatus::Expired => return Ok(DetectOutcome::Expired),
        MixStatus::AwaitingDeposit => {
            if session.is_expired(now_unix) {
                return Ok(expire_session(db, metrics, &session)?);
            }
        }
        status => {
            return Ok(DetectOutcome::Already {
                status,
                signature: session.tx_signature_in.clone(),
            })
        }
    }

    let watcher = DepositWatcher::new(config.detector);
    let started = Instant::now();
    let signatures = client
        .signatures_for_address(&session.deposit_address, config.detector.signature_limit)
        .await
        .map_err(|err| MixError::ChainRpc(err.to_string()))?;
    metrics.record_latency("signatures", started.elapsed());

    for info in &signatures {
        if !watcher.is_candidate(info, now_unix) {
            continue;
        }
        // A transaction already claimed by another session must never be
        // matched a second time.
        if let Some(owner) = db.find_by_signature(&info.signature)? {
            if owner.id != session.id {
                debug!(signature = %info.signature, owner = %owner.id, "signature already claimed");
                continue;
            }
        }
        let Some(tx) = client
            .transaction(&info.signature)
            .await
            .map_err(|err| MixError::ChainRpc(err.to_string()))?
        else {
            continue;
        };
        let Some(lamports) = watcher.match_transfer(&tx, &session.deposit_address, session.amount_sol)
        else {
            continue;
        };

        let update = SessionUpdate {
            tx_signature_in: Some(info.signature.clone()),
            deposit_detected_at: Some(now_unix),
            ..SessionUpdate::default()
        };
        return match db.transition(
            &session.id,
            MixStatus::AwaitingDeposit,
            MixStatus::DepositDetected,
            update,
        )? {
            Transition::Applied(updated) => {
                metrics.record_transition(
                    &updated.id,
                    MixStatus::AwaitingDeposit,
                    MixStatus::DepositDetected,
                );
                info!(
                    session_id = %updated.id,
                    signature = %info.signature,
                    lamports,
                    "deposit detected"
                );
                Ok(DetectOutcome::Detected {
                    signature: info.signature.clone(),
                    lamports_received: lamports,
                })
            }
            // A concurrent poll won the transition; report its result.
            Transition::Conflict(current) => Ok(outcome_for_current(&current)),
        };
    }

    Ok(DetectOutcome::Pending)
}

/// Executes the payout for a detected deposit. Safe to call repeatedly:
/// a completed session replays its stored receipt, and the
/// `deposit_detected -> processing` compare-and-set admits exactly one
/// submitter.
pub async fn process_payout<D, C, M>(
    db: &D,
    client: &C,
    metrics: &M,
    config: &MixConfig,
    session_id: &str,
    now_unix: i64,
) -> Result<PayoutReceipt, MixError>
where
    D: SessionDb + ?Sized,
    C: ChainClient + ?Sized,
    M: SessionMetrics + ?Sized,
{
    let session = db.get(session_id)?.ok_or(MixError::SessionNotFound)?;

    match session.status {
        MixStatus::Completed => return replay_receipt(&session),
        MixStatus::Expired => return Err(MixError::SessionExpired),
        MixStatus::AwaitingDeposit if session.is_expired(now_unix) => {
            expire_session(db, metrics, &session)?;
            return Err(MixError::SessionExpired);
        }
        MixStatus::DepositDetected => {}
        status => return Err(MixError::InvalidStatus(status)),
    }

    // Balance and blockhash are fetched before the processing transition so
    // an RPC failure here leaves the session retryable.
    let started = Instant::now();
    let balance = client
        .balance(&session.deposit_address)
        .await
        .map_err(|err| MixError::ChainRpc(err.to_string()))?;
    metrics.record_latency("balance", started.elapsed());

    if balance <= config.flat_fee_lamports {
        warn!(
            session_id = %session.id,
            balance,
            fee = config.flat_fee_lamports,
            "deposit balance does not cover the network fee"
        );
        fail_session(db, metrics, &session.id, MixStatus::DepositDetected)?;
        return Err(MixError::InsufficientBalance);
    }
    let transfer_lamports = balance - config.flat_fee_lamports;

    let started = Instant::now();
    let Blockhash { blockhash, .. } = client
        .latest_blockhash()
        .await
        .map_err(|err| MixError::ChainRpc(err.to_string()))?;
    metrics.record_latency("blockhash", started.elapsed());

    match db.transition(
        &session.id,
        MixStatus::DepositDetected,
        MixStatus::Processing,
        SessionUpdate::default(),
    )? {
        Transition::Applied(_) => {
            metrics.record_transition(
                &session.id,
                MixStatus::DepositDetected,
                MixStatus::Processing,
            );
        }
        // A concurrent call holds (or finished) the payout; never submit a
        // second transfer for the same deposit.
        Transition::Conflict(current) => {
            return match current.status {
                MixStatus::Completed => replay_receipt(&current),
                status => Err(MixError::InvalidStatus(status)),
            };
        }
    }

    let deposit_secret = SecretKey::from_bytes(&session.deposit_secret_encrypted)
        .map_err(|err| MixError::Store(anyhow!("corrupt deposit secret: {err}")))?;
    let output = SecretKey::generate();
    let output_address = output.address();
    let output_secret = output.to_bytes().to_vec();

    let blockhash_bytes = decode_address(&blockhash)
        .map_err(|err| MixError::Store(anyhow!("malformed blockhash from rpc: {err}")))?;
    let signed_tx = build_transfer(
        &deposit_secret,
        &output.public_key(),
        transfer_lamports,
        &blockhash_bytes,
    )
    .map_err(|err| MixError::Store(anyhow!("build transfer: {err}")))?;
    // The raw deposit key is needed only for the signature above.
    drop(deposit_secret);
    drop(output);

    let started = Instant::now();
    let submission = client.submit_transaction(&signed_tx).await;
    metrics.record_latency("submit", started.elapsed());

    let tx_signature_out = match submission {
        Ok(signature) => signature,
        Err(err) => {
            warn!(session_id = %session.id, %err, "transaction submission failed");
            fail_session(db, metrics, &session.id, MixStatus::Processing)?;
            return Err(MixError::SubmissionFailed(err.to_string()));
        }
    };

    let update = SessionUpdate {
        output_address: Some(output_address.clone()),
        output_secret: Some(output_secret.clone()),
        tx_signature_out: Some(tx_signature_out.clone()),
        completed_at: Some(now_unix),
        ..SessionUpdate::default()
    };
    match db.transition(
        &session.id,
        MixStatus::Processing,
        MixStatus::Completed,
        update,
    )? {
        Transition::Applied(updated) => {
            metrics.record_transition(&updated.id, MixStatus::Processing, MixStatus::Completed);
            info!(
                session_id = %updated.id,
                output_address = %output_address,
                tx_signature_out = %tx_signature_out,
                transfer_lamports,
                "mix payout complete"
            );
            Ok(PayoutReceipt {
                output_address,
                output_secret,
                tx_signature_out,
                lamports_transferred: Some(transfer_lamports),
            })
        }
        Transition::Conflict(current) => {
            // Unreachable by construction: this call holds `processing`.
            Err(MixError::Store(anyhow!(
                "lost processing transition for session {} (status {})",
                current.id,
                current.status
            )))
        }
    }
}

fn expire_session<D, M>(db: &D, metrics: &M, session: &MixSession) -> Result<DetectOutcome, MixError>
where
    D: SessionDb + ?Sized,
    M: SessionMetrics + ?Sized,
{
    match db.transition(
        &session.id,
        MixStatus::AwaitingDeposit,
        MixStatus::Expired,
        SessionUpdate::default(),
    )? {
        Transition::Applied(_) => {
            metrics.record_transition(&session.id, MixStatus::AwaitingDeposit, MixStatus::Expired);
            info!(session_id = %session.id, "session expired");
            Ok(DetectOutcome::Expired)
        }
        Transition::Conflict(current) => Ok(outcome_for_current(&current)),
    }
}

fn fail_session<D, M>(
    db: &D,
    metrics: &M,
    session_id: &str,
    expected: MixStatus,
) -> Result<(), MixError>
where
    D: SessionDb + ?Sized,
    M: SessionMetrics + ?Sized,
{
    if let Transition::Applied(_) =
        db.transition(session_id, expected, MixStatus::Failed, SessionUpdate::default())?
    {
        metrics.record_transition(session_id, expected, MixStatus::Failed);
    }
    Ok(())
}

fn outcome_for_current(current: &MixSession) -> DetectOutcome {
    match current.status {
        MixStatus::Expired => DetectOutcome::Expired,
        MixStatus::AwaitingDeposit => DetectOutcome::Pending,
        status => DetectOutcome::Already {
            status,
            signature: current.tx_signature_in.clone(),
        },
    }
}

fn replay_receipt(session: &MixSession) -> Result<PayoutReceipt, MixError> {
    let (output_address, output_secret, tx_signature_out) = match (
        session.output_address.clone(),
        session.output_secret.clone(),
        session.tx_signature_out.clone(),
    ) {
        (Some(address), Some(secret), Some(signature)) => (address, secret, signature),
        _ => {
            return Err(MixError::Store(anyhow!(
                "completed session {} is missing payout fields",
                session.id
            )))
        }
    };
    Ok(PayoutReceipt {
        output_address,
        output_secret,
        tx_signature_out,
        lamports_transferred: None,
    })
}
