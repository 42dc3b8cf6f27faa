//! Progressive tax bracket evaluation
//!
//! A schedule is an ordered list of brackets, each taxing the income between
//! the previous bracket's upper limit and its own at a single marginal rate on
//! top of the tax already accrued at its lower bound.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TaxError;

/// One validated bracket of a schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxBracket {
    /// Inclusive upper limit; `None` for the unbounded top bracket
    pub upper_limit: Option<Decimal>,
    pub marginal_rate: Decimal,
    pub tax_at_lower_bound: Decimal,
}

/// Bracket row as written in a parameters file.
///
/// `base_tax` may be left out on every row, in which case it is derived from
/// the limits and rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<Decimal>,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_tax: Option<Decimal>,
}

/// A bracket table that is monotonic and continuous at every boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BracketRow>", into = "Vec<BracketRow>")]
pub struct BracketSchedule {
    brackets: Vec<TaxBracket>,
}

impl BracketSchedule {
    /// Build a schedule, checking every table invariant
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, TaxError> {
        let Some(last) = brackets.last() else {
            return Err(TaxError::InvalidBrackets("schedule is empty".to_string()));
        };
        if last.upper_limit.is_some() {
            return Err(TaxError::InvalidBrackets(
                "last bracket must be unbounded".to_string(),
            ));
        }

        let mut lower_bound = Decimal::ZERO;
        let mut previous: Option<&TaxBracket> = None;

        for (i, bracket) in brackets.iter().enumerate() {
            if bracket.marginal_rate < Decimal::ZERO || bracket.marginal_rate > Decimal::ONE {
                return Err(TaxError::InvalidBrackets(format!(
                    "bracket {} rate {} outside [0, 1]",
                    i + 1,
                    bracket.marginal_rate
                )));
            }

            match previous {
                None => {
                    if bracket.tax_at_lower_bound < Decimal::ZERO {
                        return Err(TaxError::InvalidBrackets(
                            "first bracket base tax must not be negative".to_string(),
                        ));
                    }
                }
                Some(prev) => {
                    if bracket.marginal_rate < prev.marginal_rate {
                        return Err(TaxError::InvalidBrackets(format!(
                            "bracket {} rate {} is lower than the previous rate {}",
                            i + 1,
                            bracket.marginal_rate,
                            prev.marginal_rate
                        )));
                    }

                    let prev_limit = prev.upper_limit.ok_or_else(|| {
                        TaxError::InvalidBrackets(format!(
                            "bracket {} is unbounded but not last",
                            i
                        ))
                    })?;
                    let expected = prev.tax_at_lower_bound
                        + (prev_limit - lower_bound) * prev.marginal_rate;
                    if bracket.tax_at_lower_bound != expected {
                        return Err(TaxError::InvalidBrackets(format!(
                            "bracket {} base tax {} breaks continuity, expected {}",
                            i + 1,
                            bracket.tax_at_lower_bound,
                            expected
                        )));
                    }
                    lower_bound = prev_limit;
                }
            }

            if let Some(limit) = bracket.upper_limit {
                if limit <= lower_bound {
                    return Err(TaxError::InvalidBrackets(format!(
                        "bracket {} limit {} must exceed {}",
                        i + 1,
                        limit,
                        lower_bound
                    )));
                }
            }

            previous = Some(bracket);
        }

        Ok(Self { brackets })
    }

    /// Build a schedule from (upper limit, rate) pairs, deriving each base tax
    pub fn from_limits_and_rates(rows: &[(Option<Decimal>, Decimal)]) -> Result<Self, TaxError> {
        let mut brackets = Vec::with_capacity(rows.len());
        let mut base_tax = Decimal::ZERO;
        let mut lower_bound = Decimal::ZERO;

        for (upper_limit, rate) in rows {
            brackets.push(TaxBracket {
                upper_limit: *upper_limit,
                marginal_rate: *rate,
                tax_at_lower_bound: base_tax,
            });
            if let Some(limit) = upper_limit {
                base_tax += (*limit - lower_bound) * *rate;
                lower_bound = *limit;
            }
        }

        Self::new(brackets)
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Lower bound of bracket `index` (0 for the first)
    pub fn lower_bound(&self, index: usize) -> Decimal {
        index
            .checked_sub(1)
            .and_then(|prev| self.brackets.get(prev))
            .and_then(|b| b.upper_limit)
            .unwrap_or(Decimal::ZERO)
    }

    /// Index of the first bracket whose upper limit covers `income`
    fn bracket_index(&self, income: Decimal) -> usize {
        self.brackets
            .iter()
            .position(|b| b.upper_limit.map_or(true, |limit| income <= limit))
            .unwrap_or(self.brackets.len() - 1)
    }
}

impl TryFrom<Vec<BracketRow>> for BracketSchedule {
    type Error = TaxError;

    fn try_from(rows: Vec<BracketRow>) -> Result<Self, Self::Error> {
        let given = rows.iter().filter(|r| r.base_tax.is_some()).count();
        if given == 0 {
            let pairs: Vec<(Option<Decimal>, Decimal)> =
                rows.iter().map(|r| (r.upper_limit, r.rate)).collect();
            return Self::from_limits_and_rates(&pairs);
        }
        if given != rows.len() {
            return Err(TaxError::InvalidBrackets(
                "base_tax must be given on every bracket or on none".to_string(),
            ));
        }

        Self::new(
            rows.into_iter()
                .map(|r| TaxBracket {
                    upper_limit: r.upper_limit,
                    marginal_rate: r.rate,
                    tax_at_lower_bound: r.base_tax.unwrap_or(Decimal::ZERO),
                })
                .collect(),
        )
    }
}

impl From<BracketSchedule> for Vec<BracketRow> {
    fn from(schedule: BracketSchedule) -> Self {
        schedule
            .brackets
            .into_iter()
            .map(|b| BracketRow {
                upper_limit: b.upper_limit,
                rate: b.marginal_rate,
                base_tax: Some(b.tax_at_lower_bound),
            })
            .collect()
    }
}

/// Tax owed on an income and the bracket it lands in
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BracketTax {
    pub tax: Decimal,
    pub marginal_rate: Decimal,
    pub bracket_index: usize,
}

/// Evaluate the schedule at `taxable_income`.
///
/// Negative income is taxed as zero.
pub fn evaluate(taxable_income: Decimal, schedule: &BracketSchedule) -> BracketTax {
    let income = taxable_income.max(Decimal::ZERO);
    let index = schedule.bracket_index(income);
    let bracket = &schedule.brackets[index];
    let tax = bracket.tax_at_lower_bound + (income - schedule.lower_bound(index)) * bracket.marginal_rate;

    debug!(
        "Income {} falls in bracket {} at rate {}: tax {}",
        income,
        index + 1,
        bracket.marginal_rate,
        tax
    );

    BracketTax {
        tax,
        marginal_rate: bracket.marginal_rate,
        bracket_index: index,
    }
}

/// Extra tax caused by adding `additional_income` on top of `base_income`
pub fn marginal_tax(
    additional_income: Decimal,
    base_income: Decimal,
    schedule: &BracketSchedule,
) -> Decimal {
    let with_additional = evaluate(base_income + additional_income, schedule).tax;
    let without = evaluate(base_income, schedule).tax;
    (with_additional - without).max(Decimal::ZERO)
}

/// How much more income fits before the next, higher bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BracketHeadroom {
    pub current_rate: Decimal,
    /// `None` in the top bracket
    pub next_rate: Option<Decimal>,
    pub next_limit: Option<Decimal>,
    pub distance_to_next: Option<Decimal>,
    /// Share of the current bracket's upper limit already used, in percent
    pub percent_used: Decimal,
}

pub fn headroom(taxable_income: Decimal, schedule: &BracketSchedule) -> BracketHeadroom {
    let income = taxable_income.max(Decimal::ZERO);
    let index = schedule.bracket_index(income);
    let bracket = &schedule.brackets[index];
    let next_rate = schedule.brackets.get(index + 1).map(|b| b.marginal_rate);

    let percent_used = match bracket.upper_limit {
        Some(limit) => (income / limit * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED),
        None => Decimal::ONE_HUNDRED,
    };

    BracketHeadroom {
        current_rate: bracket.marginal_rate,
        next_rate,
        next_limit: bracket.upper_limit,
        distance_to_next: bracket.upper_limit.map(|limit| limit - income),
        percent_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn schedule_2025() -> BracketSchedule {
        BracketSchedule::from_limits_and_rates(&[
            (Some(dec!(70000)), dec!(0.15)),
            (Some(dec!(150000)), dec!(0.20)),
            (Some(dec!(550000)), dec!(0.27)),
            (Some(dec!(1900000)), dec!(0.35)),
            (None, dec!(0.40)),
        ])
        .unwrap()
    }

    #[test]
    fn test_derived_base_taxes() {
        let bases: Vec<Decimal> = schedule_2025()
            .brackets()
            .iter()
            .map(|b| b.tax_at_lower_bound)
            .collect();
        assert_eq!(
            bases,
            vec![dec!(0), dec!(10500), dec!(26500), dec!(134500), dec!(607000)]
        );
    }

    #[test]
    fn test_evaluate_within_brackets() {
        let s = schedule_2025();
        assert_eq!(evaluate(dec!(0), &s).tax, dec!(0));
        assert_eq!(evaluate(dec!(50000), &s).tax, dec!(7500));
        assert_eq!(evaluate(dec!(100000), &s).tax, dec!(16500));
        assert_eq!(evaluate(dec!(100000), &s).marginal_rate, dec!(0.20));
        assert_eq!(evaluate(dec!(2000000), &s).tax, dec!(647000));
        assert_eq!(evaluate(dec!(2000000), &s).bracket_index, 4);
    }

    #[test]
    fn test_boundaries_are_continuous() {
        let s = schedule_2025();
        for (i, bracket) in s.brackets().iter().enumerate() {
            if let Some(limit) = bracket.upper_limit {
                let at_limit = evaluate(limit, &s);
                assert_eq!(at_limit.tax, s.brackets()[i + 1].tax_at_lower_bound);
                assert_eq!(at_limit.bracket_index, i);
            }
        }
    }

    #[test]
    fn test_tax_is_monotonic_and_never_exceeds_unit_rate() {
        let s = schedule_2025();
        let mut income = dec!(69990);
        let mut previous = evaluate(income, &s).tax;
        while income < dec!(70010) {
            income += dec!(1);
            let tax = evaluate(income, &s).tax;
            assert!(tax >= previous);
            assert!(tax - previous <= dec!(1) * dec!(0.20));
            previous = tax;
        }
    }

    #[test]
    fn test_negative_income_is_taxed_as_zero() {
        assert_eq!(evaluate(dec!(-500), &schedule_2025()).tax, dec!(0));
    }

    #[test]
    fn test_marginal_tax_across_boundary() {
        let s = schedule_2025();
        // 5000 at 15% + 5000 at 20%
        assert_eq!(marginal_tax(dec!(10000), dec!(65000), &s), dec!(1750));
    }

    #[test]
    fn test_headroom() {
        let s = schedule_2025();
        let h = headroom(dec!(123411), &s);
        assert_eq!(h.current_rate, dec!(0.20));
        assert_eq!(h.next_rate, Some(dec!(0.27)));
        assert_eq!(h.distance_to_next, Some(dec!(26589)));

        let top = headroom(dec!(5000000), &s);
        assert_eq!(top.next_rate, None);
        assert_eq!(top.distance_to_next, None);
        assert_eq!(top.percent_used, dec!(100));
    }

    #[test]
    fn test_rejects_discontinuous_table() {
        let err = BracketSchedule::new(vec![
            TaxBracket {
                upper_limit: Some(dec!(100)),
                marginal_rate: dec!(0.1),
                tax_at_lower_bound: dec!(0),
            },
            TaxBracket {
                upper_limit: None,
                marginal_rate: dec!(0.2),
                tax_at_lower_bound: dec!(5),
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("continuity"));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(BracketSchedule::from_limits_and_rates(&[]).is_err());
        assert!(BracketSchedule::from_limits_and_rates(&[(Some(dec!(10)), dec!(0.1))]).is_err());
        assert!(BracketSchedule::from_limits_and_rates(&[
            (Some(dec!(100)), dec!(0.1)),
            (Some(dec!(100)), dec!(0.2)),
            (None, dec!(0.3)),
        ])
        .is_err());
        assert!(BracketSchedule::from_limits_and_rates(&[
            (Some(dec!(100)), dec!(0.3)),
            (None, dec!(0.2)),
        ])
        .is_err());
        assert!(BracketSchedule::from_limits_and_rates(&[
            (None, dec!(0.1)),
            (None, dec!(0.2)),
        ])
        .is_err());
    }

    #[test]
    fn test_rows_with_explicit_base_tax() {
        let rows = vec![
            BracketRow {
                upper_limit: Some(dec!(70000)),
                rate: dec!(0.15),
                base_tax: Some(dec!(0)),
            },
            BracketRow {
                upper_limit: None,
                rate: dec!(0.20),
                base_tax: Some(dec!(10500)),
            },
        ];
        let s = BracketSchedule::try_from(rows).unwrap();
        assert_eq!(evaluate(dec!(80000), &s).tax, dec!(12500));

        let mixed = vec![
            BracketRow {
                upper_limit: Some(dec!(70000)),
                rate: dec!(0.15),
                base_tax: Some(dec!(0)),
            },
            BracketRow {
                upper_limit: None,
                rate: dec!(0.20),
                base_tax: None,
            },
        ];
        assert!(BracketSchedule::try_from(mixed).is_err());
    }
}
