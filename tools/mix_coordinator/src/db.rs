//! Session persistence.
//!
//! The store's `transition` is the single atomicity unit of the whole
//! engine: every status change is a compare-and-set against the expected
//! current status, so concurrent detect/process calls cannot both advance
//! the same session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};

use crate::state::{MixSession, MixStatus};

/// Field updates applied together with a status change.
#[derive(Debug, Default, Clone)]
pub struct SessionUpdate {
    pub tx_signature_in: Option<String>,
    pub deposit_detected_at: Option<i64>,
    pub output_address: Option<String>,
    pub output_secret: Option<Vec<u8>>,
    pub tx_signature_out: Option<String>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum Transition {
    /// The caller won the compare-and-set; the updated record.
    Applied(MixSession),
    /// Another caller got there first; the record as it stands now.
    Conflict(MixSession),
}

pub trait SessionDb: Send + Sync {
    fn create(&self, session: &MixSession) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<MixSession>>;
    /// Looks up the session that already claimed an incoming transaction
    /// signature, if any. Guards against paying out the same deposit twice.
    fn find_by_signature(&self, signature: &str) -> Result<Option<MixSession>>;
    fn transition(
        &self,
        id: &str,
        expected: MixStatus,
        new_status: MixStatus,
        update: SessionUpdate,
    ) -> Result<Transition>;
}

/// One pretty-printed JSON file per session under a state directory.
pub struct JsonFileDb {
    base_dir: PathBuf,
    // Serializes read-modify-write cycles; file writes alone are not
    // atomic with respect to concurrent status reads.
    write_lock: Mutex<()>,
}

impl JsonFileDb {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create directory: {base_dir:?}"))?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }

    fn load(&self, id: &str) -> Result<Option<MixSession>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read session file: {path:?}"))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session file: {path:?}"))?;
        Ok(Some(session))
    }

    fn store(&self, session: &MixSession) -> Result<()> {
        let path = self.session_path(&session.id);
        let json = serde_json::to_string_pretty(session)
            .with_context(|| format!("failed to serialize session {}", session.id))?;
        fs::write(&path, json).with_context(|| format!("failed to write session file: {path:?}"))
    }
}

impl SessionDb for JsonFileDb {
    fn create(&self, session: &MixSession) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let path = self.session_path(&session.id);
        if path.exists() {
            return Err(anyhow!("session already exists: {}", session.id));
        }
        self.store(session)
    }

    fn get(&self, id: &str) -> Result<Option<MixSession>> {
        self.load(id)
    }

    fn find_by_signature(&self, signature: &str) -> Result<Option<MixSession>> {
        for entry in fs::read_dir(&self.base_dir)
            .with_context(|| format!("failed to list state directory: {:?}", self.base_dir))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read session file: {path:?}"))?;
            let session: MixSession = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse session file: {path:?}"))?;
            if session.tx_signature_in.as_deref() == Some(signature) {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    fn transition(
        &self,
        id: &str,
        expected: MixStatus,
        new_status: MixStatus,
        update: SessionUpdate,
    ) -> Result<Transition> {
        let _guard = self.write_lock.lock().unwrap();
        let mut session = self
            .load(id)?
            .ok_or_else(|| anyhow!("session not found: {id}"))?;

        if session.status != expected {
            return Ok(Transition::Conflict(session));
        }

        session.status = new_status;
        if update.tx_signature_in.is_some() {
            session.tx_signature_in = update.tx_signature_in;
        }
        if update.deposit_detected_at.is_some() {
            session.deposit_detected_at = update.deposit_detected_at;
        }
        if update.output_address.is_some() {
            session.output_address = update.output_address;
        }
        if update.output_secret.is_some() {
            session.output_secret = update.output_secret;
        }
        if update.tx_signature_out.is_some() {
            session.tx_signature_out = update.tx_signature_out;
        }
        if update.completed_at.is_some() {
            session.completed_at = update.completed_at;
        }

        self.store(&session)?;
        Ok(Transition::Applied(session))
    }
}
