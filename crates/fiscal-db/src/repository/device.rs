//! # Device Repository
//!
//! Fiscal devices known to this gateway. Registration with the authority
//! happens elsewhere; this table only records what was registered.

use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A registered fiscal device.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Device {
    pub device_id: String,
    pub serial_no: Option<String>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub registered_at: NaiveDateTime,
}

impl Device {
    pub fn new(device_id: impl Into<String>) -> Self {
        Device {
            device_id: device_id.into(),
            serial_no: None,
            model_name: None,
            model_version: None,
            registered_at: Utc::now().naive_utc(),
        }
    }
}

/// Repository for device database operations.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

impl DeviceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DeviceRepository { pool }
    }

    /// Inserts the device or refreshes its model details.
    ///
    /// `registered_at` of an existing row is kept.
    pub async fn upsert(&self, device: &Device) -> DbResult<()> {
        debug!(device_id = %device.device_id, "Upserting device");

        sqlx::query(
            r#"
            INSERT INTO devices (device_id, serial_no, model_name, model_version, registered_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (device_id) DO UPDATE SET
                serial_no = excluded.serial_no,
                model_name = excluded.model_name,
                model_version = excluded.model_version
            "#,
        )
        .bind(&device.device_id)
        .bind(&device.serial_no)
        .bind(&device.model_name)
        .bind(&device.model_version)
        .bind(device.registered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, device_id: &str) -> DbResult<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT device_id, serial_no, model_name, model_version, registered_at
            FROM devices
            WHERE device_id = ?1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    pub async fn list(&self) -> DbResult<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT device_id, serial_no, model_name, model_version, registered_at
            FROM devices
            ORDER BY device_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
