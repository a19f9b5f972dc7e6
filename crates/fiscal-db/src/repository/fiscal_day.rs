//! # Fiscal Day Repository
//!
//! ## Fiscal Day Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  insert_open(device, dayNo)   ──►  FiscalDayOpened   (is_open = 1)     │
//! │                                        │                                │
//! │                    ┌───────────────────┴──────────────┐                 │
//! │                    ▼                                  ▼                 │
//! │  mark_closed()  FiscalDayClosed      mark_close_failed() FiscalDayCloseFailed
//! │                 (is_open = 0)                        (still open,       │
//! │                                                       close retried)    │
//! │                                                                         │
//! │  A partial unique index allows one open day per device.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};

use fiscal_core::{FiscalDay, FiscalDayStatus};

use crate::error::{DbError, DbResult};
use crate::repository::to_unsigned;

#[derive(Debug, Clone, sqlx::FromRow)]
struct FiscalDayRow {
    device_id: String,
    fiscal_day_no: i64,
    opened_at: NaiveDateTime,
    closed_at: Option<NaiveDateTime>,
    is_open: bool,
    status: String,
}

impl TryFrom<FiscalDayRow> for FiscalDay {
    type Error = DbError;

    fn try_from(row: FiscalDayRow) -> DbResult<Self> {
        Ok(FiscalDay {
            day_no: to_unsigned("fiscal_day_no", row.fiscal_day_no)?,
            status: row
                .status
                .parse::<FiscalDayStatus>()
                .map_err(|e| DbError::corrupt("status", e))?,
            device_id: row.device_id,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            is_open: row.is_open,
        })
    }
}

const SELECT_FISCAL_DAY: &str = r#"
    SELECT device_id, fiscal_day_no, opened_at, closed_at, is_open, status
    FROM fiscal_days
"#;

/// Repository for fiscal day database operations.
#[derive(Debug, Clone)]
pub struct FiscalDayRepository {
    pool: SqlitePool,
}

impl FiscalDayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FiscalDayRepository { pool }
    }

    /// Records a newly opened fiscal day.
    ///
    /// ## Errors
    /// `UniqueViolation` if the device already has an open day or the day
    /// number was used before.
    pub async fn insert_open(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        opened_at: NaiveDateTime,
    ) -> DbResult<FiscalDay> {
        info!(device_id = %device_id, fiscal_day_no, "Recording opened fiscal day");

        sqlx::query(
            r#"
            INSERT INTO fiscal_days (device_id, fiscal_day_no, opened_at, is_open, status)
            VALUES (?1, ?2, ?3, 1, ?4)
            "#,
        )
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .bind(opened_at)
        .bind(FiscalDayStatus::Opened.as_str())
        .execute(&self.pool)
        .await?;

        Ok(FiscalDay {
            device_id: device_id.to_string(),
            day_no: fiscal_day_no,
            opened_at,
            closed_at: None,
            is_open: true,
            status: FiscalDayStatus::Opened,
        })
    }

    /// The device's open fiscal day, if any.
    pub async fn get_open(&self, device_id: &str) -> DbResult<Option<FiscalDay>> {
        let row = sqlx::query_as::<_, FiscalDayRow>(&format!(
            "{} WHERE device_id = ?1 AND is_open = 1",
            SELECT_FISCAL_DAY
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FiscalDay::try_from).transpose()
    }

    pub async fn get(&self, device_id: &str, fiscal_day_no: u32) -> DbResult<Option<FiscalDay>> {
        let row = sqlx::query_as::<_, FiscalDayRow>(&format!(
            "{} WHERE device_id = ?1 AND fiscal_day_no = ?2",
            SELECT_FISCAL_DAY
        ))
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .fetch_optional(&self.pool)
        .await?;

        row.map(FiscalDay::try_from).transpose()
    }

    /// Most recent days first.
    pub async fn list_for_device(&self, device_id: &str, limit: u32) -> DbResult<Vec<FiscalDay>> {
        let rows = sqlx::query_as::<_, FiscalDayRow>(&format!(
            "{} WHERE device_id = ?1 ORDER BY fiscal_day_no DESC LIMIT ?2",
            SELECT_FISCAL_DAY
        ))
        .bind(device_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FiscalDay::try_from).collect()
    }

    /// Marks the day closed after the authority accepted the close.
    pub async fn mark_closed(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        closed_at: NaiveDateTime,
    ) -> DbResult<()> {
        info!(device_id = %device_id, fiscal_day_no, "Marking fiscal day closed");

        let result = sqlx::query(
            r#"
            UPDATE fiscal_days
            SET is_open = 0, closed_at = ?3, status = ?4
            WHERE device_id = ?1 AND fiscal_day_no = ?2
            "#,
        )
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .bind(closed_at)
        .bind(FiscalDayStatus::Closed.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "FiscalDay",
                format!("{}/{}", device_id, fiscal_day_no),
            ));
        }

        Ok(())
    }

    /// Records a rejected close. The day stays open so the close can be retried.
    pub async fn mark_close_failed(&self, device_id: &str, fiscal_day_no: u32) -> DbResult<()> {
        debug!(device_id = %device_id, fiscal_day_no, "Marking fiscal day close failed");

        let result = sqlx::query(
            r#"
            UPDATE fiscal_days
            SET status = ?3
            WHERE device_id = ?1 AND fiscal_day_no = ?2 AND is_open = 1
            "#,
        )
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .bind(FiscalDayStatus::CloseFailed.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "FiscalDay",
                format!("{}/{}", device_id, fiscal_day_no),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Database, DbConfig};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fiscal_days();

        let opened = repo.insert_open("321", 84, at(7)).await.unwrap();
        assert!(opened.is_open);

        let open = repo.get_open("321").await.unwrap().unwrap();
        assert_eq!(open.day_no, 84);
        assert_eq!(open.status, FiscalDayStatus::Opened);
        assert_eq!(open.opened_at, at(7));

        repo.mark_close_failed("321", 84).await.unwrap();
        let failed = repo.get_open("321").await.unwrap().unwrap();
        assert_eq!(failed.status, FiscalDayStatus::CloseFailed);

        repo.mark_closed("321", 84, at(22)).await.unwrap();
        assert!(repo.get_open("321").await.unwrap().is_none());

        let closed = repo.get("321", 84).await.unwrap().unwrap();
        assert!(!closed.is_open);
        assert_eq!(closed.closed_at, Some(at(22)));
        assert_eq!(closed.status, FiscalDayStatus::Closed);
    }

    #[tokio::test]
    async fn test_one_open_day_per_device() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fiscal_days();

        repo.insert_open("321", 84, at(7)).await.unwrap();
        let second = repo.insert_open("321", 85, at(8)).await.unwrap_err();
        assert!(second.is_unique_on("device_id"));
        assert!(!second.is_unique_on("fiscal_day_no"));

        // Other devices are independent
        repo.insert_open("322", 1, at(7)).await.unwrap();

        repo.mark_closed("321", 84, at(20)).await.unwrap();
        repo.insert_open("321", 85, at(21)).await.unwrap();

        let days = repo.list_for_device("321", 10).await.unwrap();
        let numbers: Vec<u32> = days.iter().map(|d| d.day_no).collect();
        assert_eq!(numbers, vec![85, 84]);
    }

    #[tokio::test]
    async fn test_missing_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.fiscal_days();

        assert!(repo.get("321", 1).await.unwrap().is_none());
        assert!(matches!(
            repo.mark_closed("321", 1, at(9)).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.mark_close_failed("321", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
