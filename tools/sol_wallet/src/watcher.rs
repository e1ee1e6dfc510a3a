//! Deposit matching over polled chain state.
//!
//! The watcher is deliberately pure: callers fetch signature listings and
//! parsed transactions, the watcher only decides whether an entry is a
//! candidate and whether a transaction pays the expected amount into the
//! deposit address. This keeps detection a function of (session, latest
//! chain signatures) with no connection state.

use tracing::debug;

use crate::rpc::{ParsedTransaction, SignatureInfo};
use crate::tx::LAMPORTS_PER_SOL;

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Ignore signatures older than this horizon.
    pub recency_window_secs: i64,
    /// Accept deposits short of the expected amount by at most this much.
    pub tolerance_sol: f64,
    /// Signature listing page size per poll.
    pub signature_limit: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            recency_window_secs: 5 * 60,
            tolerance_sol: 0.001,
            signature_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepositWatcher {
    config: DetectorConfig,
}

impl DepositWatcher {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// A signature entry is worth fetching when it did not fail on-chain
    /// and its block time falls inside the recency window. Entries without
    /// a block time have not landed in a block and are skipped until they
    /// do.
    pub fn is_candidate(&self, info: &SignatureInfo, now_unix: i64) -> bool {
        if info.err.is_some() {
            return false;
        }
        match info.block_time {
            Some(block_time) => now_unix - block_time <= self.config.recency_window_secs,
            None => false,
        }
    }

    /// Returns the received lamports when `tx` carries a system transfer
    /// into `deposit_address` of at least `expected_sol` minus the
    /// tolerance. Excess over the expected amount is accepted.
    pub fn match_transfer(
        &self,
        tx: &ParsedTransaction,
        deposit_address: &str,
        expected_sol: f64,
    ) -> Option<u64> {
        if tx.failed {
            return None;
        }
        let floor_sol = expected_sol - self.config.tolerance_sol;
        for ix in &tx.instructions {
            if ix.program != "system" || ix.kind != "transfer" {
                continue;
            }
            if ix.destination.as_deref() != Some(deposit_address) {
                continue;
            }
            let Some(lamports) = ix.lamports else {
                continue;
            };
            let received_sol = lamports as f64 / LAMPORTS_PER_SOL as f64;
            if received_sol >= floor_sol {
                debug!(deposit_address, lamports, "matched incoming transfer");
                return Some(lamports);
            }
        }
        None
    }
}
