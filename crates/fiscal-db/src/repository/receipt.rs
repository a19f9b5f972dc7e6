//! # Receipt Repository
//!
//! Signed receipts and their priced lines.
//!
//! ## Storage Layout
//! ```text
//! receipts                              receipt_lines
//! ┌──────────────────────────────┐      ┌─────────────────────────────┐
//! │ id (uuid)                    │◄─────│ receipt_id                  │
//! │ device_id, invoice_no  UNIQ  │      │ line_no              UNIQ   │
//! │ device_id, global_no   UNIQ  │      │ line_total_cents            │
//! │ device_id, day, counter UNIQ │      │ tax_code, tax_id,           │
//! │ hash, signature, prev hash   │      │ tax_percent_bps (NULL = A)  │
//! └──────────────────────────────┘      └─────────────────────────────┘
//! ```
//!
//! A receipt and its lines are written in one transaction. Tax summaries
//! are not stored; they are recomputed from the lines on read.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use fiscal_core::receipt::tax_summary;
use fiscal_core::types::{Quantity, TaxBracket, TaxCode, TaxRate};
use fiscal_core::{
    CreditDebitRef, DeviceSignature, LineItem, Money, MoneyType, Receipt, ReceiptType,
};

use crate::error::{DbError, DbResult};
use crate::repository::{to_stored, to_unsigned};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReceiptRow {
    id: String,
    device_id: String,
    invoice_no: String,
    receipt_type: String,
    currency: String,
    money_type: String,
    receipt_date: NaiveDateTime,
    fiscal_day_no: i64,
    receipt_counter: i64,
    global_no: i64,
    total_cents: i64,
    hash: String,
    signature: String,
    previous_hash: Option<String>,
    verification_code: String,
    qr_url: String,
    credit_debit_ref: Option<String>,
    notes: Option<String>,
    authority_receipt_id: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LineRow {
    receipt_id: String,
    line_no: i64,
    name: String,
    hs_code: Option<String>,
    quantity_milli: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
    tax_code: String,
    tax_id: i64,
    tax_percent_bps: Option<i64>,
}

impl TryFrom<LineRow> for LineItem {
    type Error = DbError;

    fn try_from(row: LineRow) -> DbResult<Self> {
        let code = row
            .tax_code
            .parse::<TaxCode>()
            .map_err(|e| DbError::corrupt("tax_code", e))?;
        let percent = row
            .tax_percent_bps
            .map(|bps| to_unsigned::<u32>("tax_percent_bps", bps).map(TaxRate::from_bps))
            .transpose()?;

        Ok(LineItem {
            line_no: to_unsigned("line_no", row.line_no)?,
            name: row.name,
            hs_code: row.hs_code,
            quantity: Quantity::from_milli(row.quantity_milli),
            unit_price: Money::from_cents(row.unit_price_cents),
            line_total: Money::from_cents(row.line_total_cents),
            tax: TaxBracket {
                code,
                percent,
                tax_id: to_unsigned("tax_id", row.tax_id)?,
            },
        })
    }
}

impl ReceiptRow {
    fn into_receipt(self, lines: Vec<LineItem>) -> DbResult<Receipt> {
        let receipt_type = self
            .receipt_type
            .parse::<ReceiptType>()
            .map_err(|e| DbError::corrupt("receipt_type", e))?;
        let credit_debit_ref = self
            .credit_debit_ref
            .as_deref()
            .map(serde_json::from_str::<CreditDebitRef>)
            .transpose()
            .map_err(|e| DbError::corrupt("credit_debit_ref", e))?;
        let authority_receipt_id = self
            .authority_receipt_id
            .map(|id| to_unsigned::<u64>("authority_receipt_id", id))
            .transpose()?;

        Ok(Receipt {
            taxes: tax_summary(&lines),
            lines,
            device_id: self.device_id,
            invoice_no: self.invoice_no,
            receipt_type,
            currency: self.currency,
            money_type: MoneyType::normalize(&self.money_type),
            receipt_date: self.receipt_date,
            fiscal_day_no: to_unsigned("fiscal_day_no", self.fiscal_day_no)?,
            counter: to_unsigned("receipt_counter", self.receipt_counter)?,
            global_no: to_unsigned("global_no", self.global_no)?,
            total: Money::from_cents(self.total_cents),
            signature: DeviceSignature {
                hash: self.hash,
                signature: self.signature,
            },
            previous_hash: self.previous_hash,
            verification_code: self.verification_code,
            qr_url: self.qr_url,
            credit_debit_ref,
            notes: self.notes,
            authority_receipt_id,
        })
    }
}

const SELECT_RECEIPT: &str = r#"
    SELECT
        id, device_id, invoice_no, receipt_type, currency, money_type,
        receipt_date, fiscal_day_no, receipt_counter, global_no, total_cents,
        hash, signature, previous_hash, verification_code, qr_url,
        credit_debit_ref, notes, authority_receipt_id
    FROM receipts
"#;

const SELECT_LINE: &str = r#"
    SELECT
        receipt_id, line_no, name, hs_code, quantity_milli, unit_price_cents,
        line_total_cents, tax_code, tax_id, tax_percent_bps
    FROM receipt_lines
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for receipt database operations.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Stores a signed receipt with its lines. Returns the new row id.
    ///
    /// ## Errors
    /// `UniqueViolation` naming the clashing columns when the invoice
    /// number, global number or day counter is already taken.
    pub async fn insert(&self, receipt: &Receipt) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();

        debug!(
            id = %id,
            device_id = %receipt.device_id,
            global_no = receipt.global_no,
            counter = receipt.counter,
            "Inserting receipt"
        );

        let credit_debit_ref = receipt
            .credit_debit_ref
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let authority_receipt_id = receipt
            .authority_receipt_id
            .map(|id| to_stored("authority_receipt_id", id))
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, device_id, invoice_no, receipt_type, currency, money_type,
                receipt_date, fiscal_day_no, receipt_counter, global_no, total_cents,
                hash, signature, previous_hash, verification_code, qr_url,
                credit_debit_ref, notes, authority_receipt_id, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&id)
        .bind(&receipt.device_id)
        .bind(&receipt.invoice_no)
        .bind(receipt.receipt_type.authority_name())
        .bind(&receipt.currency)
        .bind(receipt.money_type.authority_name())
        .bind(receipt.receipt_date)
        .bind(i64::from(receipt.fiscal_day_no))
        .bind(i64::from(receipt.counter))
        .bind(to_stored("global_no", receipt.global_no)?)
        .bind(receipt.total.cents())
        .bind(&receipt.signature.hash)
        .bind(&receipt.signature.signature)
        .bind(&receipt.previous_hash)
        .bind(&receipt.verification_code)
        .bind(&receipt.qr_url)
        .bind(&credit_debit_ref)
        .bind(&receipt.notes)
        .bind(authority_receipt_id)
        .bind(Utc::now().naive_utc())
        .execute(&mut *tx)
        .await?;

        for line in &receipt.lines {
            sqlx::query(
                r#"
                INSERT INTO receipt_lines (
                    receipt_id, line_no, name, hs_code, quantity_milli,
                    unit_price_cents, line_total_cents, tax_code, tax_id, tax_percent_bps
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&id)
            .bind(i64::from(line.line_no))
            .bind(&line.name)
            .bind(&line.hs_code)
            .bind(line.quantity.milli())
            .bind(line.unit_price.cents())
            .bind(line.line_total.cents())
            .bind(line.tax.code.letter())
            .bind(i64::from(line.tax.tax_id))
            .bind(line.tax.percent.map(|rate| i64::from(rate.bps())))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    /// All receipts of one fiscal day, ordered by receipt counter.
    pub async fn list_for_day(&self, device_id: &str, fiscal_day_no: u32) -> DbResult<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(&format!(
            "{} WHERE device_id = ?1 AND fiscal_day_no = ?2 ORDER BY receipt_counter",
            SELECT_RECEIPT
        ))
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .fetch_all(&self.pool)
        .await?;

        let line_rows = sqlx::query_as::<_, LineRow>(&format!(
            r#"{}
            WHERE receipt_id IN (
                SELECT id FROM receipts WHERE device_id = ?1 AND fiscal_day_no = ?2
            )
            ORDER BY receipt_id, line_no"#,
            SELECT_LINE
        ))
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_receipt: HashMap<String, Vec<LineItem>> = HashMap::new();
        for row in line_rows {
            let receipt_id = row.receipt_id.clone();
            lines_by_receipt
                .entry(receipt_id)
                .or_default()
                .push(LineItem::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_receipt.remove(&row.id).unwrap_or_default();
                row.into_receipt(lines)
            })
            .collect()
    }

    /// The receipt with the highest global number ever recorded for the device.
    pub async fn last_for_device(&self, device_id: &str) -> DbResult<Option<Receipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!(
            "{} WHERE device_id = ?1 ORDER BY global_no DESC LIMIT 1",
            SELECT_RECEIPT
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines_for(&row.id).await?;
                row.into_receipt(lines).map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn get_by_invoice(&self, device_id: &str, invoice_no: &str) -> DbResult<Option<Receipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!(
            "{} WHERE device_id = ?1 AND invoice_no = ?2",
            SELECT_RECEIPT
        ))
        .bind(device_id)
        .bind(invoice_no)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines_for(&row.id).await?;
                row.into_receipt(lines).map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn exists(&self, device_id: &str, invoice_no: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM receipts WHERE device_id = ?1 AND invoice_no = ?2",
        )
        .bind(device_id)
        .bind(invoice_no)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn count_for_day(&self, device_id: &str, fiscal_day_no: u32) -> DbResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM receipts WHERE device_id = ?1 AND fiscal_day_no = ?2",
        )
        .bind(device_id)
        .bind(i64::from(fiscal_day_no))
        .fetch_one(&self.pool)
        .await?;

        to_unsigned("count", count)
    }

    /// Stores the id the authority assigned after accepting the receipt.
    pub async fn set_authority_receipt_id(
        &self,
        device_id: &str,
        global_no: u64,
        authority_receipt_id: u64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE receipts SET authority_receipt_id = ?3 WHERE device_id = ?1 AND global_no = ?2",
        )
        .bind(device_id)
        .bind(to_stored("global_no", global_no)?)
        .bind(to_stored("authority_receipt_id", authority_receipt_id)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "Receipt",
                format!("{}/{}", device_id, global_no),
            ));
        }

        Ok(())
    }

    async fn lines_for(&self, receipt_id: &str) -> DbResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            "{} WHERE receipt_id = ?1 ORDER BY line_no",
            SELECT_LINE
        ))
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LineItem::try_from).collect()
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

    fn standard() -> TaxBracket {
        TaxBracket {
            code: TaxCode::Standard,
            percent: Some(TaxRate::from_bps(1500)),
            tax_id: 3,
        }
    }

    fn exempt() -> TaxBracket {
        TaxBracket {
            code: TaxCode::Exempt,
            percent: None,
            tax_id: 1,
        }
    }

    fn line(line_no: u32, cents: i64, tax: TaxBracket) -> LineItem {
        LineItem {
            line_no,
            name: format!("Item {}", line_no),
            hs_code: None,
            quantity: Quantity::from_units(1),
            unit_price: Money::from_cents(cents),
            line_total: Money::from_cents(cents),
            tax,
        }
    }

    fn receipt(counter: u32, global_no: u64, previous_hash: Option<&str>) -> Receipt {
        let lines = vec![line(1, 10000, standard()), line(2, 2500, exempt())];
        let taxes = tax_summary(&lines);
        Receipt {
            device_id: "321".to_string(),
            invoice_no: format!("INV-{}", global_no),
            receipt_type: ReceiptType::Sale,
            currency: "USD".to_string(),
            money_type: MoneyType::Cash,
            receipt_date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(14, 5, 9)
                .unwrap(),
            fiscal_day_no: 84,
            counter,
            global_no,
            total: Money::from_cents(14000),
            lines,
            taxes,
            signature: DeviceSignature {
                hash: format!("hash-{}", global_no),
                signature: format!("sig-{}", global_no),
            },
            previous_hash: previous_hash.map(str::to_string),
            verification_code: "C61A8674A8F90930".to_string(),
            qr_url: "https://fdmstest.zimra.co.zw/x".to_string(),
            credit_debit_ref: None,
            notes: None,
            authority_receipt_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.receipts();

        let original = receipt(1, 77, None);
        repo.insert(&original).await.unwrap();

        let stored = repo.list_for_day("321", 84).await.unwrap();
        assert_eq!(stored, vec![original.clone()]);

        assert!(repo.exists("321", "INV-77").await.unwrap());
        assert!(!repo.exists("321", "INV-78").await.unwrap());
        assert!(!repo.exists("999", "INV-77").await.unwrap());
        assert_eq!(repo.count_for_day("321", 84).await.unwrap(), 1);
        assert_eq!(repo.get_by_invoice("321", "INV-77").await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_credit_note_reference_round_trips() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.receipts();

        let mut note = receipt(1, 5, None);
        note.receipt_type = ReceiptType::CreditNote;
        note.lines = vec![line(1, -1000, standard())];
        note.taxes = tax_summary(&note.lines);
        note.total = Money::from_cents(-1150);
        note.credit_debit_ref = Some(CreditDebitRef {
            receipt_id: Some(9001),
            device_id: None,
            receipt_global_no: None,
            fiscal_day_no: None,
        });
        note.notes = Some("Returned goods".to_string());
        repo.insert(&note).await.unwrap();

        let stored = repo.get_by_invoice("321", "INV-5").await.unwrap().unwrap();
        assert_eq!(stored, note);
    }

    #[tokio::test]
    async fn test_ordering_and_last_receipt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.receipts();

        // Inserted out of order on purpose
        repo.insert(&receipt(2, 11, Some("hash-10"))).await.unwrap();
        repo.insert(&receipt(1, 10, None)).await.unwrap();
        repo.insert(&receipt(3, 12, Some("hash-11"))).await.unwrap();

        let day = repo.list_for_day("321", 84).await.unwrap();
        let counters: Vec<u32> = day.iter().map(|r| r.counter).collect();
        assert_eq!(counters, vec![1, 2, 3]);
        assert!(day.iter().all(|r| r.lines.len() == 2));

        let last = repo.last_for_device("321").await.unwrap().unwrap();
        assert_eq!(last.global_no, 12);
        assert_eq!(last.lines.len(), 2);

        assert!(repo.last_for_device("999").await.unwrap().is_none());
        assert!(repo.list_for_day("321", 85).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_rejected_atomically() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.receipts();

        repo.insert(&receipt(1, 10, None)).await.unwrap();

        // Same invoice number, different numbering
        let mut same_invoice = receipt(2, 11, Some("hash-10"));
        same_invoice.invoice_no = "INV-10".to_string();
        match repo.insert(&same_invoice).await {
            Err(err) if err.is_unique_on("invoice_no") => {}
            other => panic!("expected unique violation, got {:?}", other),
        }

        // Same global number
        let mut same_global = receipt(2, 10, Some("hash-10"));
        same_global.invoice_no = "INV-other".to_string();
        let err = repo.insert(&same_global).await.unwrap_err();
        assert!(err.is_unique_on("global_no"));

        // No orphan lines left behind by the failed inserts
        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM receipt_lines")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(lines, 2);
    }

    #[tokio::test]
    async fn test_authority_receipt_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.receipts();

        repo.insert(&receipt(1, 10, None)).await.unwrap();
        repo.set_authority_receipt_id("321", 10, 555).await.unwrap();

        let stored = repo.last_for_device("321").await.unwrap().unwrap();
        assert_eq!(stored.authority_receipt_id, Some(555));

        assert!(matches!(
            repo.set_authority_receipt_id("321", 99, 1).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
