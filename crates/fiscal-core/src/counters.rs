//! # Fiscal Counter Aggregation
//!
//! Computes a fiscal day's counters from its receipts. Counters are a pure
//! view: recomputed on every request, never stored.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receipts of the day                                                    │
//! │       │                                                                 │
//! │       ├──► 1. group lines by (type, currency, tax id)                   │
//! │       │        → sales Σ lineTotal, tax Σ line tax                      │
//! │       │                                                                 │
//! │       ├──► 2. for type × observed currency × configured bracket:       │
//! │       │        *ByTax     = sales                                       │
//! │       │        *TaxByTax  = tax       (standard bracket only)           │
//! │       │        zero values are dropped                                  │
//! │       │                                                                 │
//! │       └──► 3. group receipts by (currency, money type)                  │
//! │                BalanceByMoneyType = Σ receipt total (kept even if 0)    │
//! │                                                                         │
//! │  4. sort: tax id (balance last) → type name → currency → money type    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only currencies that appear on at least one receipt are considered;
//! counters are never fabricated for inactive currencies.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::tax::TaxCodeResolver;
use crate::types::{
    FiscalCounter, FiscalCounterType, MoneyType, Receipt, ReceiptType, TaxCode,
};

// =============================================================================
// Filter
// =============================================================================

/// Whitelists applied during aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterFilter {
    pub currencies: Vec<String>,
    pub counter_types: Vec<FiscalCounterType>,
    /// Configured brackets, in the order they are considered.
    pub tax_codes: Vec<TaxCode>,
}

impl Default for CounterFilter {
    fn default() -> Self {
        CounterFilter {
            currencies: vec!["ZWG".to_string(), "USD".to_string()],
            counter_types: FiscalCounterType::ALL.to_vec(),
            tax_codes: vec![
                TaxCode::Exempt,
                TaxCode::Zero,
                TaxCode::Standard,
                TaxCode::Withholding,
            ],
        }
    }
}

impl CounterFilter {
    fn allows_currency(&self, currency: &str) -> bool {
        self.currencies.iter().any(|c| c == currency)
    }

    fn allows_type(&self, counter_type: FiscalCounterType) -> bool {
        self.counter_types.contains(&counter_type)
    }
}

// =============================================================================
// Aggregator
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct BracketTotals {
    sales: Money,
    tax: Money,
}

/// Aggregates receipts into fiscal counters.
#[derive(Debug, Clone)]
pub struct CounterAggregator {
    resolver: TaxCodeResolver,
    filter: CounterFilter,
}

impl CounterAggregator {
    pub fn new(resolver: TaxCodeResolver, filter: CounterFilter) -> Self {
        CounterAggregator { resolver, filter }
    }

    pub fn filter(&self) -> &CounterFilter {
        &self.filter
    }

    /// Counters for a status query. An empty day yields an empty list.
    pub fn aggregate(&self, receipts: &[Receipt]) -> Vec<FiscalCounter> {
        let receipts: Vec<&Receipt> = receipts
            .iter()
            .filter(|receipt| {
                let allowed = self.filter.allows_currency(&receipt.currency);
                if !allowed {
                    warn!(
                        invoice_no = %receipt.invoice_no,
                        currency = %receipt.currency,
                        "Receipt currency is not configured, excluded from counters"
                    );
                }
                allowed
            })
            .collect();

        let configured_ids: BTreeSet<u32> = self
            .filter
            .tax_codes
            .iter()
            .map(|code| self.resolver.bracket(*code).tax_id)
            .collect();

        // Step 1: line totals per (type, currency, tax id)
        let mut by_bracket: BTreeMap<(ReceiptType, &str, u32), BracketTotals> = BTreeMap::new();
        let mut currencies: BTreeSet<&str> = BTreeSet::new();
        for receipt in &receipts {
            currencies.insert(receipt.currency.as_str());
            for line in &receipt.lines {
                if !configured_ids.contains(&line.tax.tax_id) {
                    warn!(
                        invoice_no = %receipt.invoice_no,
                        line_no = line.line_no,
                        tax_id = line.tax.tax_id,
                        "Line tax id is not configured, counted in balance only"
                    );
                }
                let totals = by_bracket
                    .entry((receipt.receipt_type, receipt.currency.as_str(), line.tax.tax_id))
                    .or_default();
                totals.sales += line.line_total;
                totals.tax += line.tax_amount();
            }
        }

        let mut counters = Vec::new();

        // Step 2: *ByTax and *TaxByTax per configured bracket
        for receipt_type in ReceiptType::ALL {
            for currency in &currencies {
                for code in &self.filter.tax_codes {
                    let bracket = self.resolver.bracket(*code);
                    let Some(totals) = by_bracket.get(&(receipt_type, *currency, bracket.tax_id))
                    else {
                        continue;
                    };

                    let by_tax = receipt_type.by_tax_counter();
                    if self.filter.allows_type(by_tax) && !totals.sales.is_zero() {
                        counters.push(FiscalCounter::by_tax(by_tax, *currency, &bracket, totals.sales));
                    }

                    let tax_by_tax = receipt_type.tax_by_tax_counter();
                    if *code == TaxCode::Standard
                        && self.filter.allows_type(tax_by_tax)
                        && !totals.tax.is_zero()
                    {
                        counters.push(FiscalCounter::by_tax(
                            tax_by_tax, *currency, &bracket, totals.tax,
                        ));
                    }
                }
            }
        }

        // Step 3: balances per (currency, money type), zero kept
        if self.filter.allows_type(FiscalCounterType::BalanceByMoneyType) {
            let mut balances: BTreeMap<(&str, MoneyType), Money> = BTreeMap::new();
            for receipt in &receipts {
                *balances
                    .entry((receipt.currency.as_str(), receipt.money_type))
                    .or_default() += receipt.total;
            }
            counters.extend(
                balances
                    .into_iter()
                    .map(|((currency, money_type), value)| {
                        FiscalCounter::balance(currency, money_type, value)
                    }),
            );
        }

        sort_counters(&mut counters);
        debug!(
            receipts = receipts.len(),
            counters = counters.len(),
            "Fiscal counters aggregated"
        );
        counters
    }

    /// Counters for a CloseDay payload. An empty day is an error.
    pub fn for_close_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        receipts: &[Receipt],
    ) -> CoreResult<Vec<FiscalCounter>> {
        if receipts.is_empty() {
            return Err(CoreError::EmptyFiscalDay {
                device_id: device_id.to_string(),
                fiscal_day_no,
            });
        }
        Ok(self.aggregate(receipts))
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Sort key used by the CloseDay protocol. Balance counters have no tax id
/// and sort after every real id.
fn tax_id_key(counter: &FiscalCounter) -> u64 {
    counter.tax_id.map_or(u64::MAX, u64::from)
}

pub fn compare_counters(a: &FiscalCounter, b: &FiscalCounter) -> Ordering {
    tax_id_key(a)
        .cmp(&tax_id_key(b))
        .then_with(|| a.counter_type.name().cmp(b.counter_type.name()))
        .then_with(|| a.currency.cmp(&b.currency))
        .then_with(|| {
            let mt = |c: &FiscalCounter| c.money_type.map(|m| m.authority_name());
            mt(a).cmp(&mt(b))
        })
        .then_with(|| a.value.cmp(&b.value))
}

pub fn sort_counters(counters: &mut [FiscalCounter]) {
    counters.sort_by(compare_counters);
}

// =============================================================================
// Unit Tests
// =============================================================================
