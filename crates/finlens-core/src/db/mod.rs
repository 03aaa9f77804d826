//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `expenses` - Expense and budget records, plus the `RecordStore` used by query templates
//! - `audit` - The `ai_audit_log` ledger (`AuditLedger` implementation)

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod audit;
mod expenses;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Passphrase for the SQLCipher key
pub const DB_KEY_ENV: &str = "FINLENS_DB_KEY";

/// Connections per database pool
const POOL_SIZE: u32 = 10;

/// `PRAGMA key` statement for a passphrase
///
/// The key is the Argon2id hash of the passphrase under a fixed salt, so the
/// same passphrase opens the same file wherever it is moved.
fn key_pragma(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Never change: every existing ledger is keyed with it
    const KEY_SALT: &[u8; 16] = b"finlens-salt-v1!";

    let salt = SaltString::encode_b64(KEY_SALT)
        .map_err(|e| Error::Encryption(format!("Invalid key salt: {}", e)))?;
    let digest = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Key derivation failed: {}", e)))?
        .hash
        .ok_or_else(|| Error::Encryption("Key derivation produced no output".to_string()))?;

    Ok(format!("PRAGMA key = 'x\"{}\"';", hex::encode(digest.as_bytes())))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // CURRENT_TIMESTAMP format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Pooled SQLite store holding expenses, budgets and the decision ledger
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    /// Opened with a passphrase
    keyed: bool,
}

impl Database {
    /// Open (or create) an encrypted database keyed from `FINLENS_DB_KEY`
    ///
    /// Fails when the variable is unset; `new_unencrypted` is the explicit
    /// opt-out used by `--no-encrypt` and tests.
    pub fn new(path: &str) -> Result<Self> {
        let passphrase = std::env::var(DB_KEY_ENV).map_err(|_| {
            Error::Encryption(format!(
                "{} is not set. Export a passphrase to encrypt expenses and the audit log, \
                 or pass --no-encrypt to store them in plain SQLite.",
                DB_KEY_ENV
            ))
        })?;
        Self::new_with_key(path, Some(&passphrase))
    }

    /// Open (or create) a plain SQLite database
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open (or create) a database, keyed when a passphrase is given
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let manager = match passphrase {
            Some(passphrase) => {
                let pragma = key_pragma(passphrase)?;
                // Every pooled connection must present the key before use
                manager.with_init(move |conn| conn.execute_batch(&pragma))
            }
            None => manager,
        };

        let db = Self {
            pool: Pool::builder().max_size(POOL_SIZE).build(manager)?,
            db_path: path.to_string(),
            keyed: passphrase.is_some(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "finlens_test_{}_{}.db",
            std::process::id(),
            id
        ));

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Whether the file is keyed with SQLCipher
    pub fn is_encrypted(&self) -> Result<bool> {
        if !self.keyed {
            return Ok(false);
        }
        let conn = self.conn()?;
        let cipher: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(cipher.is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block the audit writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Expenses (read by query templates)
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY,
                date DATE NOT NULL,                       -- YYYY-MM-DD
                description TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                category TEXT NOT NULL,                   -- CategoryLabel display name
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);
            CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category, date);

            -- Monthly budgets, one per category
            CREATE TABLE IF NOT EXISTS budgets (
                category TEXT PRIMARY KEY,
                monthly_limit REAL NOT NULL CHECK (monthly_limit >= 0),
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Decision ledger (append-only)
            CREATE TABLE IF NOT EXISTS ai_audit_log (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,                       -- categorization, query
                method TEXT NOT NULL,                     -- rule/fallback/manual, or the query intent
                confidence REAL,
                input_summary TEXT NOT NULL,
                output_summary TEXT NOT NULL,
                model TEXT,
                latency_ms INTEGER,
                supersedes INTEGER REFERENCES ai_audit_log(id),
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_ai_audit_kind_input ON ai_audit_log(kind, input_summary);
            CREATE INDEX IF NOT EXISTS idx_ai_audit_timestamp ON ai_audit_log(timestamp);

            CREATE TRIGGER IF NOT EXISTS ai_audit_log_no_update
            BEFORE UPDATE ON ai_audit_log
            BEGIN
                SELECT RAISE(ABORT, 'ai_audit_log is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS ai_audit_log_no_delete
            BEFORE DELETE ON ai_audit_log
            BEGIN
                SELECT RAISE(ABORT, 'ai_audit_log is append-only');
            END;
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
