use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::StorageConfig;
use crate::core::errors::WalletError;
use crate::core::types::MnemonicWalletRecord;
use crate::storage::WalletRepository;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub async fn connect(config: &StorageConfig) -> Result<Self, WalletError> {
        let is_memory = config.database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| WalletError::ConfigError(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);
        if !is_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // every in-memory connection is its own database
        let pool_options = if is_memory {
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
                .acquire_timeout(Duration::from_secs(30))
        };
        let pool = pool_options.connect_with(options).await?;

        let scheme = config.database_url.split(':').next().unwrap_or("sqlite");
        info!(scheme, in_memory = is_memory, "wallet repository connected");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), WalletError> {
        debug!("Initializing mnemonic_wallets schema");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mnemonic_wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_uuid TEXT NOT NULL UNIQUE,
                mnemonic_uuid TEXT NOT NULL,
                mnemonic_hash TEXT NOT NULL,
                encrypted_mnemonic BLOB NOT NULL,
                is_hot BOOLEAN NOT NULL,
                is_enabled BOOLEAN NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts `record` and returns the assigned row id; `record.id` is ignored.
    pub async fn insert(&self, record: &MnemonicWalletRecord) -> Result<i64, WalletError> {
        let result = sqlx::query(
            r#"
            INSERT INTO mnemonic_wallets
                (wallet_uuid, mnemonic_uuid, mnemonic_hash, encrypted_mnemonic,
                 is_hot, is_enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.wallet_uuid.to_string())
        .bind(record.mnemonic_uuid.to_string())
        .bind(&record.mnemonic_hash)
        .bind(&record.encrypted_mnemonic)
        .bind(record.is_hot)
        .bind(record.is_enabled)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        debug!(wallet_uuid = %record.wallet_uuid, "stored mnemonic wallet");
        Ok(result.last_insert_rowid())
    }

    pub async fn set_enabled(&self, wallet_uuid: Uuid, enabled: bool) -> Result<(), WalletError> {
        let result = sqlx::query("UPDATE mnemonic_wallets SET is_enabled = ?, updated_at = ? WHERE wallet_uuid = ?")
            .bind(enabled)
            .bind(Utc::now())
            .bind(wallet_uuid.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(WalletError::WalletNotFound(wallet_uuid.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn get_wallet_by_uuid(&self, wallet_uuid: Uuid) -> Result<MnemonicWalletRecord, WalletError> {
        let row = sqlx::query(
            r#"
            SELECT id, wallet_uuid, mnemonic_uuid, mnemonic_hash, encrypted_mnemonic,
                   is_hot, is_enabled, created_at, updated_at
            FROM mnemonic_wallets WHERE wallet_uuid = ?
            "#,
        )
        .bind(wallet_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| WalletError::WalletNotFound(wallet_uuid.to_string()))?;
        record_from_row(&row)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<MnemonicWalletRecord, WalletError> {
    let parse_uuid = |column: &str| -> Result<Uuid, WalletError> {
        let raw: String = row.try_get(column)?;
        Uuid::parse_str(&raw).map_err(|e| WalletError::StorageError(format!("{}: {}", column, e)))
    };
    Ok(MnemonicWalletRecord {
        id: row.try_get("id")?,
        wallet_uuid: parse_uuid("wallet_uuid")?,
        mnemonic_uuid: parse_uuid("mnemonic_uuid")?,
        mnemonic_hash: row.try_get("mnemonic_hash")?,
        encrypted_mnemonic: row.try_get("encrypted_mnemonic")?,
        is_hot: row.try_get("is_hot")?,
        is_enabled: row.try_get("is_enabled")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
