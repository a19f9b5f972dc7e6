//! # Receipt Pricing
//!
//! Turns a caller draft into priced lines, a typed tax summary and a total.
//! The summary is built once here and shared by storage, aggregation and
//! the SubmitReceipt signing string.
//!
//! ## Total Convention
//! ```text
//! line totals are tax-exclusive
//!
//!   line tax          = round_half_away(lineTotal × percent)   (0 for exempt)
//!   salesAmountWithTax = Σ (lineTotal + line tax)   per bracket
//!   receipt total      = Σ salesAmountWithTax
//!
//!   100.00 @ C 15%  →  tax 15.00, salesAmountWithTax 115.00, total 115.00
//! ```

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::tax::TaxCodeResolver;
use crate::types::{LineDraft, LineItem, ReceiptDraft, ReceiptType, TaxSummaryEntry};

/// Lines, tax summary and total derived from a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedReceipt {
    pub lines: Vec<LineItem>,
    pub taxes: Vec<TaxSummaryEntry>,
    pub total: Money,
}

/// Prices a draft.
///
/// ## Errors
/// - `InvalidReceiptSign` when a line's sign does not fit the receipt type
/// - `ReceiptTotalMismatch` when the caller supplied a different total
pub fn price_draft(draft: &ReceiptDraft, resolver: &TaxCodeResolver) -> CoreResult<PricedReceipt> {
    let lines = build_lines(&draft.lines, resolver);
    check_signs(draft.receipt_type, &lines)?;

    let taxes = tax_summary(&lines);
    let total = receipt_total(&taxes);

    if let Some(provided) = draft.receipt_total {
        if provided != total {
            return Err(CoreError::ReceiptTotalMismatch {
                computed: total,
                provided,
            });
        }
    }

    Ok(PricedReceipt {
        lines,
        taxes,
        total,
    })
}

/// Resolves each draft line's bracket and numbers lines from 1.
pub fn build_lines(drafts: &[LineDraft], resolver: &TaxCodeResolver) -> Vec<LineItem> {
    drafts
        .iter()
        .zip(1u32..)
        .map(|(line, line_no)| LineItem {
            line_no,
            name: line.name.trim().to_string(),
            hs_code: line.hs_code.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
            tax: resolver.resolve(line.tax_code.as_deref()),
        })
        .collect()
}

/// Builds the tax summary in receipt order (standard → zero → exempt →
/// withholding), one entry per bracket present on the receipt.
pub fn tax_summary(lines: &[LineItem]) -> Vec<TaxSummaryEntry> {
    let mut by_position: BTreeMap<usize, TaxSummaryEntry> = BTreeMap::new();

    for line in lines {
        let tax = line.tax_amount();
        let entry = by_position
            .entry(line.tax.code.receipt_position())
            .or_insert_with(|| TaxSummaryEntry {
                tax_code: line.tax.code,
                tax_percent: line.tax.percent,
                tax_id: line.tax.tax_id,
                tax_amount: Money::zero(),
                sales_amount_with_tax: Money::zero(),
            });
        entry.tax_amount += tax;
        entry.sales_amount_with_tax += line.line_total + tax;
    }

    by_position.into_values().collect()
}

pub fn receipt_total(taxes: &[TaxSummaryEntry]) -> Money {
    taxes.iter().map(|entry| entry.sales_amount_with_tax).sum()
}

/// Credit notes carry non-positive amounts; sales and debit notes
/// non-negative ones. Applies to both the unit price and the line total.
pub fn check_signs(receipt_type: ReceiptType, lines: &[LineItem]) -> CoreResult<()> {
    for line in lines {
        let amounts = [line.unit_price, line.line_total];
        let found = match receipt_type {
            ReceiptType::CreditNote if amounts.iter().any(|m| m.is_positive()) => "positive",
            ReceiptType::Sale | ReceiptType::DebitNote
                if amounts.iter().any(|m| m.is_negative()) =>
            {
                "negative"
            }
            _ => continue,
        };
        return Err(CoreError::InvalidReceiptSign {
            receipt_type: receipt_type.authority_name().to_string(),
            line_no: line.line_no,
            found,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::Environment;
    use crate::types::{MoneyType, Quantity, TaxCode, TaxRate};
    use chrono::NaiveDate;

    fn line(name: &str, cents: i64, code: &str) -> LineDraft {
        LineDraft {
            name: name.to_string(),
            hs_code: None,
            quantity: Quantity::from_units(1),
            unit_price: Money::from_cents(cents),
            line_total: Money::from_cents(cents),
            tax_code: Some(code.to_string()),
        }
    }

    fn draft(receipt_type: ReceiptType, lines: Vec<LineDraft>) -> ReceiptDraft {
        ReceiptDraft {
            invoice_no: "INV-1".to_string(),
            receipt_type,
            currency: "USD".to_string(),
            money_type: MoneyType::Cash,
            receipt_date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            lines,
            receipt_total: None,
            credit_debit_note: None,
            notes: None,
        }
    }

    #[test]
    fn test_single_standard_line() {
        let resolver = TaxCodeResolver::new(Environment::Test);
        let priced = price_draft(&draft(ReceiptType::Sale, vec![line("Bread", 10000, "C")]), &resolver)
            .unwrap();

        assert_eq!(priced.total.cents(), 11500);
        assert_eq!(priced.taxes.len(), 1);
        let entry = &priced.taxes[0];
        assert_eq!(entry.tax_code, TaxCode::Standard);
        assert_eq!(entry.tax_percent, Some(TaxRate::from_bps(1500)));
        assert_eq!(entry.tax_id, 3);
        assert_eq!(entry.tax_amount.cents(), 1500);
        assert_eq!(entry.sales_amount_with_tax.cents(), 11500);
    }

    #[test]
    fn test_summary_order_is_standard_zero_exempt_withholding() {
        let resolver = TaxCodeResolver::default();
        let lines = build_lines(
            &[
                line("w", 1000, "D"),
                line("e", 1000, "A"),
                line("z", 1000, "B"),
                line("s", 1000, "C"),
            ],
            &resolver,
        );
        let codes: Vec<_> = tax_summary(&lines).iter().map(|e| e.tax_code).collect();
        assert_eq!(
            codes,
            vec![TaxCode::Standard, TaxCode::Zero, TaxCode::Exempt, TaxCode::Withholding]
        );
    }

    #[test]
    fn test_exempt_and_zero_carry_no_tax() {
        let resolver = TaxCodeResolver::default();
        let lines = build_lines(&[line("e", 2500, "A"), line("z", 1000, "B")], &resolver);
        let taxes = tax_summary(&lines);

        assert!(taxes.iter().all(|e| e.tax_amount.is_zero()));
        let exempt = taxes.iter().find(|e| e.tax_code == TaxCode::Exempt).unwrap();
        assert_eq!(exempt.tax_percent, None);
        assert_eq!(receipt_total(&taxes).cents(), 3500);
    }

    #[test]
    fn test_per_line_rounding_is_summed() {
        // 0.05 @ 15% = 0.0075 → 0.01 per line, twice
        let resolver = TaxCodeResolver::default();
        let lines = build_lines(&[line("a", 5, "C"), line("b", 5, "C")], &resolver);
        let taxes = tax_summary(&lines);
        assert_eq!(taxes[0].tax_amount.cents(), 2);
        assert_eq!(taxes[0].sales_amount_with_tax.cents(), 12);
    }

    #[test]
    fn test_supplied_total_must_match() {
        let resolver = TaxCodeResolver::default();
        let mut d = draft(ReceiptType::Sale, vec![line("Bread", 10000, "C")]);

        d.receipt_total = Some(Money::from_cents(11500));
        assert!(price_draft(&d, &resolver).is_ok());

        d.receipt_total = Some(Money::from_cents(10000));
        let err = price_draft(&d, &resolver).unwrap_err();
        assert!(matches!(err, CoreError::ReceiptTotalMismatch { .. }));
    }

    #[test]
    fn test_credit_note_must_be_non_positive() {
        let resolver = TaxCodeResolver::default();
        let ok = draft(ReceiptType::CreditNote, vec![line("Return", -5000, "C")]);
        let priced = price_draft(&ok, &resolver).unwrap();
        assert_eq!(priced.total.cents(), -5750);

        let bad = draft(ReceiptType::CreditNote, vec![line("Return", 5000, "C")]);
        let err = price_draft(&bad, &resolver).unwrap_err();
        assert!(matches!(err, CoreError::InvalidReceiptSign { line_no: 1, .. }));
    }

    #[test]
    fn test_sale_and_debit_note_must_be_non_negative() {
        let resolver = TaxCodeResolver::default();
        for receipt_type in [ReceiptType::Sale, ReceiptType::DebitNote] {
            let bad = draft(receipt_type, vec![line("ok", 100, "C"), line("neg", -100, "C")]);
            let err = price_draft(&bad, &resolver).unwrap_err();
            assert!(matches!(err, CoreError::InvalidReceiptSign { line_no: 2, .. }));
        }
    }

    #[test]
    fn test_unit_price_sign_is_checked_too() {
        let resolver = TaxCodeResolver::default();

        let mut negative_price = line("Widget", 1000, "C");
        negative_price.unit_price = Money::from_cents(-1000);
        let bad = draft(ReceiptType::Sale, vec![negative_price]);
        let err = price_draft(&bad, &resolver).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidReceiptSign { line_no: 1, found: "negative", .. }
        ));

        let mut positive_price = line("Return", -1000, "C");
        positive_price.unit_price = Money::from_cents(1000);
        let bad = draft(ReceiptType::CreditNote, vec![positive_price]);
        let err = price_draft(&bad, &resolver).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidReceiptSign { line_no: 1, found: "positive", .. }
        ));
    }
}
