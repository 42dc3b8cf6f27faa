//! Tax-year parameters
//!
//! Bracket tables, the dividend exemption limit and the price index are
//! published out of band and change every year, so they live in a TOML file
//! rather than in code. A copy for 2025 is embedded as the fallback.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::tax::brackets::BracketSchedule;
use crate::tax::indexation::{PriceIndexTable, INDEXATION_THRESHOLD};

/// Environment variable pointing at a parameters file
pub const PARAMS_ENV_VAR: &str = "GAINBOOK_PARAMS";

const BUILTIN_PARAMS: &str = include_str!("../data/params_2025.toml");

fn default_near_indexation_floor() -> Decimal {
    Decimal::new(8, 2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxParameters {
    pub tax_year: i32,
    pub dividend_exemption_limit: Decimal,
    /// Lower edge of the "almost indexed" band used by the opportunity scan
    #[serde(default = "default_near_indexation_floor")]
    pub near_indexation_floor: Decimal,
    pub brackets: BracketSchedule,
    #[serde(default)]
    pub price_index: PriceIndexTable,
}

impl TaxParameters {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let params: TaxParameters =
            toml::from_str(content).context("Failed to parse tax parameters")?;
        params.validate()?;
        Ok(params)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters file {:?}", path))?;
        let params = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid parameters file {:?}", path))?;
        info!(
            "Loaded tax parameters for {} from {:?} ({} index months)",
            params.tax_year,
            path,
            params.price_index.len()
        );
        Ok(params)
    }

    /// Parameters shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PARAMS).context("Embedded parameters are invalid")
    }

    /// Resolve parameters: explicit path, then `$GAINBOOK_PARAMS`, then the
    /// user config file, then the embedded defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(PARAMS_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self::load(PathBuf::from(path));
        }

        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            return Self::load(path);
        }

        debug!("No parameters file found, using embedded defaults");
        Self::builtin()
    }

    fn validate(&self) -> Result<()> {
        if self.dividend_exemption_limit < Decimal::ZERO {
            return Err(anyhow!(
                "dividend_exemption_limit must not be negative, got {}",
                self.dividend_exemption_limit
            ));
        }
        if self.near_indexation_floor < Decimal::ZERO
            || self.near_indexation_floor >= INDEXATION_THRESHOLD
        {
            return Err(anyhow!(
                "near_indexation_floor must lie in [0, {}), got {}",
                INDEXATION_THRESHOLD,
                self.near_indexation_floor
            ));
        }
        Ok(())
    }
}

/// `<config_home>/gainbook/params.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("gainbook").join("params.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthKey;
    use crate::tax::brackets::evaluate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builtin_parameters_load() {
        let params = TaxParameters::builtin().unwrap();
        assert_eq!(params.tax_year, 2025);
        assert_eq!(params.dividend_exemption_limit, dec!(18000));
        assert_eq!(params.near_indexation_floor, dec!(0.08));
        assert_eq!(params.brackets.brackets().len(), 5);
        assert_eq!(params.price_index.len(), 36);

        let feb: MonthKey = "2024-02".parse().unwrap();
        assert_eq!(params.price_index.get(feb), Some(dec!(2850.45)));
        assert_eq!(evaluate(dec!(150000), &params.brackets).tax, dec!(26500));
    }

    #[test]
    fn test_base_tax_derived_when_omitted() {
        let params = TaxParameters::from_toml_str(
            r#"
tax_year = 2030
dividend_exemption_limit = "25000"

[[brackets]]
upper_limit = 100
rate = 0.1

[[brackets]]
rate = 0.3
"#,
        )
        .unwrap();
        assert_eq!(params.near_indexation_floor, dec!(0.08));
        assert!(params.price_index.is_empty());
        assert_eq!(params.brackets.brackets()[1].tax_at_lower_bound, dec!(10));
    }

    #[test]
    fn test_discontinuous_brackets_rejected() {
        let err = TaxParameters::from_toml_str(
            r#"
tax_year = 2030
dividend_exemption_limit = 1

[[brackets]]
upper_limit = 100
rate = 0.1
base_tax = 0

[[brackets]]
rate = 0.3
base_tax = 11
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("continuity"));
    }

    #[test]
    fn test_bad_index_rejected() {
        let err = TaxParameters::from_toml_str(
            r#"
tax_year = 2030
dividend_exemption_limit = 1

[[brackets]]
rate = 0.1

[price_index]
"2024-01" = -5
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("2024-01"));
    }

    #[test]
    fn test_floor_must_stay_below_threshold() {
        let err = TaxParameters::from_toml_str(
            r#"
tax_year = 2030
dividend_exemption_limit = 1
near_indexation_floor = 0.1

[[brackets]]
rate = 0.1
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("near_indexation_floor"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(&path, BUILTIN_PARAMS).unwrap();
        let params = TaxParameters::resolve(Some(&path)).unwrap();
        assert_eq!(params, TaxParameters::builtin().unwrap());

        let missing = dir.path().join("nope.toml");
        assert!(TaxParameters::load(&missing).is_err());
    }
}
