//! Persistence gateway, a thin wrapper over the relational store.
//!
//! The gateway is a trait so the reconciliation engine can be exercised
//! without a live database; the SQLite implementation is the production
//! path.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::models::{DonationRecord, RegistrationRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    /// A unique constraint rejected the write: the row already exists.
    /// Not transient; retrying the same write can never succeed.
    #[error("conflicting row already exists: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

/// Durable record operations the reconciliation flow needs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a registration row, returning its id.
    async fn insert_registration(&self, record: &RegistrationRecord) -> Result<i64, StoreError>;

    /// Insert a donation row, returning its id.
    async fn insert_donation(&self, record: &DonationRecord) -> Result<i64, StoreError>;

    /// The id of an existing registration for this email, if any.
    async fn find_registration_by_email(&self, email: &str) -> Result<Option<i64>, StoreError>;
}

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_registration(&self, record: &RegistrationRecord) -> Result<i64, StoreError> {
        let d = &record.draft;
        let result = sqlx::query(
            "INSERT INTO registrations \
             (firstname, lastname, email, phonenumber, streetaddress, apartment, \
              city, zippostalcode, country, nameofchurch, positioninministry, \
              titleofoffice, husbandname, tshirtsize, payment_method, \
              payment_status, provider_ref) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&d.firstname)
        .bind(&d.lastname)
        .bind(&d.email)
        .bind(&d.phonenumber)
        .bind(&d.streetaddress)
        .bind(&d.apartment)
        .bind(&d.city)
        .bind(&d.zippostalcode)
        .bind(&d.country)
        .bind(&d.nameofchurch)
        .bind(&d.positioninministry)
        .bind(&d.titleofoffice)
        .bind(&d.husbandname)
        .bind(&d.tshirtsize)
        .bind(record.payment_method.as_str())
        .bind(record.payment_status.as_str())
        .bind(&record.provider_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_donation(&self, record: &DonationRecord) -> Result<i64, StoreError> {
        let d = &record.draft;
        let result = sqlx::query(
            "INSERT INTO donations \
             (first_name, last_name, email, phone, amount_cents, payment_method, \
              payment_status, provider_ref) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&d.first_name)
        .bind(&d.last_name)
        .bind(&d.email)
        .bind(&d.phone)
        .bind(d.amount_cents)
        .bind(record.payment_method.as_str())
        .bind(record.payment_status.as_str())
        .bind(&record.provider_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_registration_by_email(&self, email: &str) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM registrations WHERE email = ?1 LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }
}
