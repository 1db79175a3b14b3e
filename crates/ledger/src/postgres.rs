use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, ConnectedAccountId, EmployerId, IdentityId};
use domain::{MerchantAccount, OnboardingDetail, OnboardingState};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::store::{Ledger, require_assigned};
use crate::{LedgerError, Result};

const ACCOUNT_COLUMNS: &str = "id, identity_id, connected_account_id, business_name, \
     business_email, employer_id, active, onboarding_state, onboarding_detail, created_at, updated_at";

const UNIQUE_EMAIL_INDEX: &str = "unique_active_business_email";
const UNIQUE_CONNECTED_INDEX: &str = "unique_connected_account_id";

/// PostgreSQL-backed ledger implementation.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_account(row: PgRow) -> Result<MerchantAccount> {
        let state: String = row.try_get("onboarding_state")?;
        let detail: String = row.try_get("onboarding_detail")?;
        let connected: Option<String> = row.try_get("connected_account_id")?;

        let onboarding_detail = detail.parse::<OnboardingDetail>().unwrap_or_default();
        if onboarding_detail == OnboardingDetail::Unrecognized {
            tracing::warn!(detail = %detail, "stored onboarding detail is not recognized");
        }

        Ok(MerchantAccount {
            id: AccountId::new(from_db_id(row.try_get("id")?)?),
            identity_id: IdentityId::new(
                u32::try_from(row.try_get::<i64, _>("identity_id")?)
                    .map_err(|e| LedgerError::InvalidArgument(format!("identity_id: {e}")))?,
            ),
            connected_account_id: connected.map(ConnectedAccountId::new),
            business_name: row.try_get("business_name")?,
            business_email: row.try_get("business_email")?,
            employer_id: EmployerId::new(from_db_id(row.try_get("employer_id")?)?),
            active: row.try_get("active")?,
            onboarding_state: state.parse::<OnboardingState>().unwrap_or_default(),
            onboarding_detail,
            created_at: Some(row.try_get::<DateTime<Utc>, _>("created_at")?),
            updated_at: Some(row.try_get::<DateTime<Utc>, _>("updated_at")?),
        })
    }

    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        id: AccountId,
    ) -> Result<MerchantAccount> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM merchant_accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(to_db_id(id.as_u64())?)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("id {id}")))?;

        Self::row_to_account(row)
    }

    async fn write_account(
        tx: &mut Transaction<'_, Postgres>,
        account: &MerchantAccount,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE merchant_accounts
            SET identity_id = $2, connected_account_id = $3, business_name = $4,
                business_email = $5, employer_id = $6, active = $7,
                onboarding_state = $8, onboarding_detail = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(to_db_id(account.id.as_u64())?)
        .bind(i64::from(account.identity_id.as_u32()))
        .bind(account.connected_account_id.as_ref().map(|c| c.as_str()))
        .bind(&account.business_name)
        .bind(&account.business_email)
        .bind(to_db_id(account.employer_id.as_u64())?)
        .bind(account.active)
        .bind(account.onboarding_state.as_str())
        .bind(account.onboarding_detail.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, account))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("id {}", account.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    #[tracing::instrument(skip(self, account), fields(email = %account.business_email))]
    async fn create_account(&self, account: MerchantAccount) -> Result<MerchantAccount> {
        account.validate_for_storage()?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM merchant_accounts WHERE business_email = $1 AND active",
        )
        .bind(&account.business_email)
        .fetch_optional(&mut *tx)
        .await?;
        if account.active && existing.is_some() {
            return Err(LedgerError::AlreadyExists(format!(
                "business email {}",
                account.business_email
            )));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO merchant_accounts (identity_id, connected_account_id, business_name,
                business_email, employer_id, active, onboarding_state, onboarding_detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(i64::from(account.identity_id.as_u32()))
        .bind(account.connected_account_id.as_ref().map(|c| c.as_str()))
        .bind(&account.business_name)
        .bind(&account.business_email)
        .bind(to_db_id(account.employer_id.as_u64())?)
        .bind(account.active)
        .bind(account.onboarding_state.as_str())
        .bind(account.onboarding_detail.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &account))?;

        let created = Self::row_to_account(row)?;
        tx.commit().await?;
        Ok(created)
    }

    #[tracing::instrument(skip(self, account), fields(account_id = %account.id))]
    async fn save_account(&self, account: &MerchantAccount) -> Result<()> {
        require_assigned(account.id)?;
        account.validate_for_storage()?;

        let mut tx = self.pool.begin().await?;
        Self::write_account(&mut tx, account).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<MerchantAccount> {
        require_assigned(id)?;

        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM merchant_accounts WHERE id = $1"
        ))
        .bind(to_db_id(id.as_u64())?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("id {id}")))?;

        Self::row_to_account(row)
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_account(&self, id: AccountId) -> Result<()> {
        require_assigned(id)?;

        let mut tx = self.pool.begin().await?;
        let mut account = Self::lock_account(&mut tx, id).await?;
        if account.active {
            account.deactivate();
            Self::write_account(&mut tx, &account).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn activate_account(&self, id: AccountId) -> Result<()> {
        require_assigned(id)?;

        let mut tx = self.pool.begin().await?;
        let mut account = Self::lock_account(&mut tx, id).await?;
        if !account.active {
            account.activate();
            Self::write_account(&mut tx, &account).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_connected_account_id(
        &self,
        connected_account_id: &ConnectedAccountId,
    ) -> Result<MerchantAccount> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM merchant_accounts WHERE connected_account_id = $1"
        ))
        .bind(connected_account_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            LedgerError::NotFound(format!("connected account {connected_account_id}"))
        })?;

        Self::row_to_account(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<MerchantAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM merchant_accounts WHERE business_email = $1 AND active"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| LedgerError::InvalidArgument(format!("id {id} out of range")))
}

fn from_db_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| LedgerError::InvalidArgument(format!("stored id {id} is negative")))
}

fn map_unique_violation(err: sqlx::Error, account: &MerchantAccount) -> LedgerError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some(UNIQUE_EMAIL_INDEX) => {
                return LedgerError::AlreadyExists(format!(
                    "business email {}",
                    account.business_email
                ));
            }
            Some(UNIQUE_CONNECTED_INDEX) => {
                return LedgerError::AlreadyExists(format!(
                    "connected account {}",
                    account
                        .connected_account_id
                        .as_ref()
                        .map(|c| c.as_str())
                        .unwrap_or_default()
                ));
            }
            _ => {}
        }
    }
    LedgerError::Database(err)
}
