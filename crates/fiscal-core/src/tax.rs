//! # Tax Code Resolution
//!
//! Maps symbolic tax codes to percentages and the authority's numeric tax
//! ids. The numeric ids differ between the test and production
//! environments, so a resolver is always built for one explicit
//! [`Environment`].
//!
//! ```text
//!               ┌──────────────┬──────────┬──────────┬────────────┐
//!               │   percent    │ test id  │ prod id  │            │
//!  ┌────────────┼──────────────┼──────────┼──────────┼────────────┤
//!  │ A exempt   │   (none)     │    1     │    3     │            │
//!  │ B zero     │    0.00      │    2     │    2     │            │
//!  │ C standard │   15.00      │    3     │    1     │  default   │
//!  │ D withhold │    5.00      │   514    │   514    │            │
//!  └────────────┴──────────────┴──────────┴──────────┴────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::types::{TaxBracket, TaxCode, TaxRate};

// =============================================================================
// Environment
// =============================================================================

/// Which authority environment a deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "test" | "testing" | "sandbox" => Ok(Environment::Test),
            "production" | "prod" | "live" => Ok(Environment::Production),
            _ => Err(ValidationError::NotAllowed {
                field: "environment".to_string(),
                allowed: vec!["test".to_string(), "production".to_string()],
            }),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

const STANDARD_RATE: TaxRate = TaxRate::from_bps(1500);
const WITHHOLDING_RATE: TaxRate = TaxRate::from_bps(500);

/// Environment-aware tax code resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxCodeResolver {
    environment: Environment,
}

impl TaxCodeResolver {
    pub fn new(environment: Environment) -> Self {
        TaxCodeResolver { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Percent for a code; `None` for exempt (never zero).
    pub fn percent_for(&self, code: TaxCode) -> Option<TaxRate> {
        match code {
            TaxCode::Exempt => None,
            TaxCode::Zero => Some(TaxRate::zero()),
            TaxCode::Standard => Some(STANDARD_RATE),
            TaxCode::Withholding => Some(WITHHOLDING_RATE),
        }
    }

    pub fn numeric_id_for(&self, code: TaxCode) -> u32 {
        match (self.environment, code) {
            (Environment::Test, TaxCode::Exempt) => 1,
            (Environment::Test, TaxCode::Zero) => 2,
            (Environment::Test, TaxCode::Standard) => 3,
            (Environment::Production, TaxCode::Standard) => 1,
            (Environment::Production, TaxCode::Zero) => 2,
            (Environment::Production, TaxCode::Exempt) => 3,
            (_, TaxCode::Withholding) => 514,
        }
    }

    pub fn is_exempt(&self, numeric_id: u32) -> bool {
        numeric_id == self.numeric_id_for(TaxCode::Exempt)
    }

    pub fn bracket(&self, code: TaxCode) -> TaxBracket {
        TaxBracket {
            code,
            percent: self.percent_for(code),
            tax_id: self.numeric_id_for(code),
        }
    }

    /// Reverse lookup from a numeric tax id.
    pub fn bracket_for_id(&self, numeric_id: u32) -> Option<TaxBracket> {
        self.brackets()
            .into_iter()
            .find(|bracket| bracket.tax_id == numeric_id)
    }

    /// All brackets, in letter order.
    pub fn brackets(&self) -> [TaxBracket; 4] {
        [
            self.bracket(TaxCode::Exempt),
            self.bracket(TaxCode::Zero),
            self.bracket(TaxCode::Standard),
            self.bracket(TaxCode::Withholding),
        ]
    }

    /// Resolves a raw line tax code.
    ///
    /// Missing codes take the standard bracket. Unknown codes also take the
    /// standard bracket and are logged as a data-quality warning, since they
    /// may put revenue under the wrong bracket.
    pub fn resolve(&self, raw: Option<&str>) -> TaxBracket {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => {
                debug!("Line has no tax code, using standard bracket");
                self.bracket(TaxCode::Standard)
            }
            Some(code) => match code.parse::<TaxCode>() {
                Ok(parsed) => self.bracket(parsed),
                Err(_) => {
                    warn!(tax_code = %code, "Unknown tax code, defaulting to standard bracket");
                    self.bracket(TaxCode::Standard)
                }
            },
        }
    }
}

impl Default for TaxCodeResolver {
    fn default() -> Self {
        TaxCodeResolver::new(Environment::Test)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_differ_by_environment() {
        let test = TaxCodeResolver::new(Environment::Test);
        let prod = TaxCodeResolver::new(Environment::Production);

        assert_eq!(test.numeric_id_for(TaxCode::Exempt), 1);
        assert_eq!(test.numeric_id_for(TaxCode::Standard), 3);
        assert_eq!(prod.numeric_id_for(TaxCode::Exempt), 3);
        assert_eq!(prod.numeric_id_for(TaxCode::Standard), 1);
        assert_eq!(test.numeric_id_for(TaxCode::Zero), prod.numeric_id_for(TaxCode::Zero));
        assert_eq!(test.numeric_id_for(TaxCode::Withholding), 514);
    }

    #[test]
    fn test_exempt_has_no_percent_and_zero_does() {
        let resolver = TaxCodeResolver::default();
        assert_eq!(resolver.percent_for(TaxCode::Exempt), None);
        assert_eq!(resolver.percent_for(TaxCode::Zero), Some(TaxRate::zero()));
        assert_ne!(
            resolver.numeric_id_for(TaxCode::Exempt),
            resolver.numeric_id_for(TaxCode::Zero)
        );
    }

    #[test]
    fn test_exactly_one_exempt_bracket() {
        for env in [Environment::Test, Environment::Production] {
            let resolver = TaxCodeResolver::new(env);
            let exempt: Vec<_> = resolver
                .brackets()
                .into_iter()
                .filter(|b| b.percent.is_none())
                .collect();
            assert_eq!(exempt.len(), 1);
            assert!(resolver.is_exempt(exempt[0].tax_id));
        }
    }

    #[test]
    fn test_bracket_for_id_round_trips() {
        let resolver = TaxCodeResolver::new(Environment::Production);
        for bracket in resolver.brackets() {
            assert_eq!(resolver.bracket_for_id(bracket.tax_id), Some(bracket));
        }
        assert_eq!(resolver.bracket_for_id(99), None);
    }

    #[test]
    fn test_resolve_is_lenient() {
        let resolver = TaxCodeResolver::default();
        assert_eq!(resolver.resolve(Some("A")).code, TaxCode::Exempt);
        assert_eq!(resolver.resolve(Some("0")).code, TaxCode::Zero);
        assert_eq!(resolver.resolve(None).code, TaxCode::Standard);
        assert_eq!(resolver.resolve(Some("  ")).code, TaxCode::Standard);
        assert_eq!(resolver.resolve(Some("VAT16")).code, TaxCode::Standard);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }
}
