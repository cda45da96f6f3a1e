use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Points one generation costs.
pub const GENERATION_COST: u32 = 1;
/// Points granted per window unless overridden with `--credits`.
pub const DEFAULT_POINTS: u32 = 50;
/// Fixed-window length: 30 days.
pub const WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    used: u32,
    window_started_at: DateTime<Utc>,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            used: 0,
            window_started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditStatus {
    pub remaining: u32,
    pub used: u32,
    pub points: u32,
    pub resets_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum CreditError {
    Exhausted { resets_at: DateTime<Utc> },
    Storage(anyhow::Error),
}

impl fmt::Display for CreditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditError::Exhausted { resets_at } => {
                write!(f, "You have run out of credits (resets {resets_at})")
            }
            CreditError::Storage(e) => write!(f, "Credit ledger error: {e}"),
        }
    }
}

impl std::error::Error for CreditError {}

/// Fixed-window credit ledger persisted as one JSON file. Every generation
/// consumes a point; the window resets [`WINDOW_DAYS`] after its first use.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    path: PathBuf,
    points: u32,
}

impl CreditLedger {
    pub fn new(base_dir: impl Into<PathBuf>, points: u32) -> Self {
        Self {
            path: base_dir.into().join("usage.json"),
            points,
        }
    }

    /// Consume one generation's worth of credits, or fail with the window's
    /// reset time when none remain.
    pub async fn consume(&self) -> Result<CreditStatus, CreditError> {
        let mut ledger = self.load_current().await;
        if ledger.used.saturating_add(GENERATION_COST) > self.points {
            return Err(CreditError::Exhausted {
                resets_at: resets_at(&ledger),
            });
        }
        ledger.used += GENERATION_COST;
        self.save(&ledger).await.map_err(CreditError::Storage)?;
        Ok(self.status_of(&ledger))
    }

    /// Report remaining points without consuming any.
    pub async fn status(&self) -> CreditStatus {
        let ledger = self.load_current().await;
        self.status_of(&ledger)
    }

    fn status_of(&self, ledger: &LedgerFile) -> CreditStatus {
        CreditStatus {
            remaining: self.points.saturating_sub(ledger.used),
            used: ledger.used,
            points: self.points,
            resets_at: resets_at(ledger),
        }
    }

    /// Load the ledger, starting a fresh window when the current one has
    /// lapsed. Missing or corrupt files start a fresh window too.
    async fn load_current(&self) -> LedgerFile {
        let ledger = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => LedgerFile::default(),
        };
        if Utc::now() >= resets_at(&ledger) {
            LedgerFile::default()
        } else {
            ledger
        }
    }

    async fn save(&self, ledger: &LedgerFile) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("Ledger path has no parent directory")?;
        tokio::fs::create_dir_all(parent).await?;
        let json = serde_json::to_string_pretty(ledger)?;
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        tokio::fs::write(tmp.path(), json).await?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to persist {}", self.path.display()))?;
        Ok(())
    }
}

fn resets_at(ledger: &LedgerFile) -> DateTime<Utc> {
    ledger.window_started_at + Duration::days(WINDOW_DAYS)
}

/// Where the ledger lives relative to a store base dir (test seam).
pub fn ledger_path(base_dir: &Path) -> PathBuf {
    base_dir.join("usage.json")
}
