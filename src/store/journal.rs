//! Append-only log of submissions
//!
//! Records every attempt so an operator can reconcile ambiguous outcomes
//! and spot duplicate submissions. Never consulted to suppress a call.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::warn;

use crate::domain::call::{CallRequest, CallResult};
use crate::runtime::SubmissionLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: i64,
    /// RFC 3339, UTC
    pub recorded_at: String,
    pub network: String,
    pub label: String,
    pub method: String,
    pub target: String,
    pub tx_hash: Option<String>,
    pub outcome: String,
    pub detail: Option<String>,
}

#[derive(Debug)]
pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        let journal = Self { conn };
        journal.init()?;
        Ok(journal)
    }

    pub fn open_in_memory() -> Result<Self> {
        let journal = Self {
            conn: Connection::open_in_memory()?,
        };
        journal.init()?;
        Ok(journal)
    }

    /// Record one submission attempt, returning its row id
    pub fn record(&self, network: &str, request: &CallRequest, result: &CallResult) -> Result<i64> {
        let tx_hash = result
            .tx_hash()
            .or_else(|| result.error().and_then(|err| err.tx_hash()))
            .map(|hash| hash.to_string());
        let detail = result.error().map(|err| err.to_string());

        self.conn.execute(
            "INSERT INTO submissions(recorded_at, network, label, method, target, tx_hash, outcome, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Utc::now().to_rfc3339(),
                network,
                request.label,
                request.method(),
                request.target_display(),
                tx_hash,
                result.outcome(),
                detail,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, network, label, method, target, tx_hash, outcome, detail
             FROM submissions ORDER BY id DESC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(JournalEntry {
                id: row.get(0)?,
                recorded_at: row.get(1)?,
                network: row.get(2)?,
                label: row.get(3)?,
                method: row.get(4)?,
                target: row.get(5)?,
                tx_hash: row.get(6)?,
                outcome: row.get(7)?,
                detail: row.get(8)?,
            });
        }
        Ok(out)
    }

    /// Number of recorded attempts for a label
    pub fn count_for(&self, label: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE label = ?1",
            params![label],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS submissions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                network     TEXT NOT NULL,
                label       TEXT NOT NULL,
                method      TEXT NOT NULL,
                target      TEXT NOT NULL,
                tx_hash     TEXT,
                outcome     TEXT NOT NULL,
                detail      TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_submissions_label ON submissions(label);",
        )?;
        Ok(())
    }
}

/// Feeds runner submissions into a journal, tagged with the network name
pub struct JournalLog {
    journal: Mutex<Journal>,
    network: String,
}

impl JournalLog {
    pub fn new(journal: Journal, network: impl Into<String>) -> Self {
        Self {
            journal: Mutex::new(journal),
            network: network.into(),
        }
    }
}

impl SubmissionLog for JournalLog {
    fn record(&self, request: &CallRequest, result: &CallResult) {
        let journal = match self.journal.lock() {
            Ok(journal) => journal,
            Err(poisoned) => {
                warn!("journal lock poisoned, recording anyway");
                poisoned.into_inner()
            }
        };
        if let Err(err) = journal.record(&self.network, request, result) {
            warn!("journal write failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::CallError;
    use alloy_json_abi::Function;
    use alloy_primitives::{Address, B256};

    fn mint_request() -> CallRequest {
        let function = Function::parse("function mintToken(uint256 eventId, address to)").unwrap();
        CallRequest::call(Address::ZERO, function, vec!["10".into(), Address::ZERO.to_string()])
            .with_label("mint")
    }

    #[test]
    fn test_identical_submissions_are_both_recorded() {
        let journal = Journal::open_in_memory().unwrap();
        let request = mint_request();

        journal
            .record("mumbai", &request, &CallResult::Submitted { tx_hash: B256::repeat_byte(1) })
            .unwrap();
        journal
            .record("mumbai", &request, &CallResult::Submitted { tx_hash: B256::repeat_byte(2) })
            .unwrap();

        assert_eq!(journal.count_for("mint").unwrap(), 2);
        let entries = journal.recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tx_hash, Some(B256::repeat_byte(2).to_string()));
        assert_eq!(entries[0].method, "mintToken");
        assert_eq!(entries[0].outcome, "submitted");
    }

    #[test]
    fn test_failure_keeps_hash_and_detail() {
        let journal = Journal::open_in_memory().unwrap();
        let hash = B256::repeat_byte(9);
        let result = CallResult::Failed(CallError::Confirmation {
            tx_hash: hash,
            message: "connection reset".into(),
        });

        journal.record("matic", &mint_request(), &result).unwrap();

        let entry = &journal.recent(1).unwrap()[0];
        assert_eq!(entry.outcome, "confirmation");
        assert_eq!(entry.tx_hash, Some(hash.to_string()));
        assert!(entry.detail.as_deref().unwrap().contains("connection reset"));
        assert_eq!(entry.network, "matic");
    }

    #[test]
    fn test_rejected_submission_has_no_hash() {
        let journal = Journal::open_in_memory().unwrap();
        let result = CallResult::Failed(CallError::Submission(
            "execution reverted: cap exceeded".into(),
        ));

        journal.record("mumbai", &mint_request(), &result).unwrap();

        let entry = &journal.recent(1).unwrap()[0];
        assert_eq!(entry.tx_hash, None);
        assert_eq!(entry.detail.as_deref(), Some("execution reverted: cap exceeded"));
    }

    #[test]
    fn test_poisoned_lock_still_records() {
        let log = JournalLog::new(Journal::open_in_memory().unwrap(), "mumbai");
        std::thread::scope(|scope| {
            let holder = scope.spawn(|| {
                let _guard = log.journal.lock().unwrap();
                panic!("writer died holding the journal");
            });
            assert!(holder.join().is_err());
        });
        assert!(log.journal.is_poisoned());

        log.record(
            &mint_request(),
            &CallResult::Submitted { tx_hash: B256::repeat_byte(5) },
        );

        let journal = log.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(journal.count_for("mint").unwrap(), 1);
    }
}
