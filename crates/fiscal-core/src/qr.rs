//! # QR Verification URL
//!
//! Builds the URL printed as a QR code on receipts. Two layouts exist in
//! this domain; a deployment picks one through configuration and uses it
//! for every receipt.
//!
//! ```text
//! Path (default):
//!   {qrUrl}{deviceId:010}{ddMMyyyy}{globalNo:010}{MD5(sig)[..16]}
//!   https://fdmstest.zimra.co.zw/0000000321010320240000000077C61A8674A8F90930
//!
//! Query:
//!   {qrUrl}Receipt/Result?DeviceId={deviceId:010}
//!       &ReceiptDate=MM%2FDD%2FYYYY%2000%3A00%3A00
//!       &ReceiptGlobalNo={globalNo:010}
//!       &ReceiptQrData={hex(sig) grouped by 4 with '-'}
//! ```
//!
//! The QR is advisory: a signature that cannot be decoded yields a
//! placeholder fragment instead of an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::ValidationError;
use crate::signature::VerificationCode;

const QUERY_PLACEHOLDER: &str = "0000-0000-0000-0000";

// =============================================================================
// Format
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    #[default]
    Path,
    Query,
}

impl fmt::Display for QrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QrFormat::Path => write!(f, "path"),
            QrFormat::Query => write!(f, "query"),
        }
    }
}

impl FromStr for QrFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "path" => Ok(QrFormat::Path),
            "query" => Ok(QrFormat::Query),
            _ => Err(ValidationError::NotAllowed {
                field: "qr format".to_string(),
                allowed: vec!["path".to_string(), "query".to_string()],
            }),
        }
    }
}

// =============================================================================
// Encoder
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QrCodeEncoder {
    format: QrFormat,
}

impl QrCodeEncoder {
    pub fn new(format: QrFormat) -> Self {
        QrCodeEncoder { format }
    }

    pub fn format(&self) -> QrFormat {
        self.format
    }

    pub fn build(
        &self,
        device_id: &str,
        qr_base_url: &str,
        receipt_date: NaiveDate,
        global_no: u64,
        signature_b64: &str,
    ) -> String {
        match self.format {
            QrFormat::Path => format!(
                "{}{:0>10}{}{:010}{}",
                qr_base_url,
                device_id,
                receipt_date.format("%d%m%Y"),
                global_no,
                VerificationCode::from_signature_or_placeholder(signature_b64)
            ),
            QrFormat::Query => {
                let date = receipt_date.format("%m/%d/%Y 00:00:00").to_string();
                format!(
                    "{}Receipt/Result?DeviceId={:0>10}&ReceiptDate={}&ReceiptGlobalNo={:010}&ReceiptQrData={}",
                    qr_base_url,
                    device_id,
                    urlencoding::encode(&date),
                    global_no,
                    grouped_signature_hex(signature_b64)
                )
            }
        }
    }
}

/// Upper-case hex of the signature bytes in dash-separated groups of four.
fn grouped_signature_hex(signature_b64: &str) -> String {
    match BASE64.decode(signature_b64.trim()) {
        Ok(bytes) if !bytes.is_empty() => hex::encode_upper(bytes)
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("-"),
        _ => {
            warn!("Signature could not be decoded for QR data, using placeholder");
            QUERY_PLACEHOLDER.to_string()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
