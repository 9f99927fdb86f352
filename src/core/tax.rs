use log::error;
use serde::{Deserialize, Serialize};

use super::error::PolicyError;

const BASE_TAX_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub min: f64,
    pub max: Option<f64>,
    // fraction, e.g. 0.18
    pub rate: f64,
    pub base_tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rebates {
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
    pub secondary_age: u32,
    pub tertiary_age: u32,
}

impl Rebates {
    pub fn for_age(&self, age: u32) -> f64 {
        let mut total = self.primary;
        if age >= self.secondary_age {
            total += self.secondary;
        }
        if age >= self.tertiary_age {
            total += self.tertiary;
        }
        total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementContributionDeduction {
    pub income_fraction: f64,
    pub annual_cap: f64,
}

impl RetirementContributionDeduction {
    pub fn deductible(&self, gross_annual_income: f64, annual_contribution: f64) -> f64 {
        let limit = (gross_annual_income.max(0.0) * self.income_fraction).min(self.annual_cap);
        annual_contribution.max(0.0).min(limit.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxPolicy {
    pub tax_year: String,
    pub brackets: Vec<TaxBracket>,
    pub rebates: Rebates,
    pub contribution_deduction: RetirementContributionDeduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxAssessment {
    pub income: f64,
    pub bracket_index: Option<usize>,
    pub gross_tax: f64,
    pub rebate: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryBreakdown {
    pub age: u32,
    pub gross_annual: f64,
    pub taxable_annual: f64,
    pub annual_tax: f64,
    pub net_annual: f64,
    pub gross_monthly: f64,
    pub tax_monthly: f64,
    pub net_monthly: f64,
    pub marginal_rate: f64,
    pub effective_rate: f64,
    pub deductible_contribution: f64,
    pub annual_tax_saving: f64,
}

impl TaxPolicy {
    pub fn sars_2025_26() -> Self {
        let bracket = |min: f64, max: Option<f64>, rate: f64, base_tax: f64| TaxBracket {
            min,
            max,
            rate,
            base_tax,
        };
        Self {
            tax_year: "2025/26".to_string(),
            brackets: vec![
                bracket(0.0, Some(237_100.0), 0.18, 0.0),
                bracket(237_101.0, Some(370_500.0), 0.26, 42_678.0),
                bracket(370_501.0, Some(512_800.0), 0.31, 77_362.0),
                bracket(512_801.0, Some(673_000.0), 0.36, 121_475.0),
                bracket(673_001.0, Some(857_900.0), 0.39, 179_147.0),
                bracket(857_901.0, Some(1_817_000.0), 0.41, 251_258.0),
                bracket(1_817_001.0, None, 0.45, 644_489.0),
            ],
            rebates: Rebates {
                primary: 17_235.0,
                secondary: 9_444.0,
                tertiary: 3_145.0,
                secondary_age: 65,
                tertiary_age: 75,
            },
            contribution_deduction: RetirementContributionDeduction {
                income_fraction: 0.275,
                annual_cap: 350_000.0,
            },
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let Some(first) = self.brackets.first() else {
            return Err(PolicyError::Empty);
        };
        if first.min != 0.0 {
            return Err(PolicyError::FirstBracketMin(first.min));
        }

        let rebates = &self.rebates;
        if [rebates.primary, rebates.secondary, rebates.tertiary]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(PolicyError::InvalidRebate);
        }

        let last = self.brackets.len() - 1;
        for (index, bracket) in self.brackets.iter().enumerate() {
            let values_ok = [bracket.min, bracket.rate, bracket.base_tax]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0)
                && bracket.max.is_none_or(|max| max.is_finite() && max >= bracket.min);
            if !values_ok {
                return Err(PolicyError::InvalidValue { index });
            }

            match (bracket.max, index == last) {
                (None, false) => return Err(PolicyError::OpenBracketNotLast { index }),
                (Some(_), true) => return Err(PolicyError::TopBracketBounded { index }),
                _ => {}
            }

            if index == 0 {
                if bracket.base_tax != 0.0 {
                    return Err(PolicyError::BaseTaxMismatch {
                        index,
                        base_tax: bracket.base_tax,
                        expected: 0.0,
                    });
                }
                continue;
            }

            let prev = &self.brackets[index - 1];
            let prev_max = prev.max.unwrap_or(f64::INFINITY);
            let expected_min = prev_max + 1.0;
            if bracket.min != expected_min {
                return Err(PolicyError::Discontinuous {
                    index,
                    min: bracket.min,
                    expected: expected_min,
                });
            }

            let expected_base = prev.base_tax + (prev_max - prev.min) * prev.rate;
            if (bracket.base_tax - expected_base).abs() > BASE_TAX_TOLERANCE + prev.rate {
                return Err(PolicyError::BaseTaxMismatch {
                    index,
                    base_tax: bracket.base_tax,
                    expected: expected_base,
                });
            }
        }
        Ok(())
    }

    fn bracket_for(&self, income: f64) -> Option<usize> {
        self.brackets
            .iter()
            .position(|b| income >= 0.0 && b.max.is_none_or(|max| income <= max))
    }

    pub fn assess(&self, annual_taxable_income: f64, age: u32) -> TaxAssessment {
        let income = if annual_taxable_income.is_nan() {
            annual_taxable_income
        } else {
            annual_taxable_income.max(0.0)
        };

        let Some(index) = self.bracket_for(income) else {
            error!(
                "no tax bracket covers income {income} in {} table; charging zero tax",
                self.tax_year
            );
            return TaxAssessment {
                income,
                bracket_index: None,
                gross_tax: 0.0,
                rebate: 0.0,
                tax: 0.0,
            };
        };

        let bracket = &self.brackets[index];
        let gross_tax = bracket.base_tax + (income - bracket.min).max(0.0) * bracket.rate;
        let rebate = self.rebates.for_age(age);
        TaxAssessment {
            income,
            bracket_index: Some(index),
            gross_tax,
            rebate,
            tax: (gross_tax - rebate).max(0.0),
        }
    }

    pub fn marginal_rate(&self, annual_taxable_income: f64) -> f64 {
        self.bracket_for(annual_taxable_income.max(0.0))
            .map(|index| self.brackets[index].rate)
            .unwrap_or(0.0)
    }

    pub fn salary_breakdown(
        &self,
        gross_annual_income: f64,
        age: u32,
        annual_retirement_contribution: f64,
    ) -> SalaryBreakdown {
        let gross = gross_annual_income.max(0.0);
        let deductible = self
            .contribution_deduction
            .deductible(gross, annual_retirement_contribution);
        let taxable = gross - deductible;

        let annual_tax = self.assess(taxable, age).tax;
        let tax_without_deduction = self.assess(gross, age).tax;
        let net_annual = gross - annual_tax;

        SalaryBreakdown {
            age,
            gross_annual: gross,
            taxable_annual: taxable,
            annual_tax,
            net_annual,
            gross_monthly: gross / 12.0,
            tax_monthly: annual_tax / 12.0,
            net_monthly: net_annual / 12.0,
            marginal_rate: self.marginal_rate(taxable),
            effective_rate: if gross > 0.0 { annual_tax / gross } else { 0.0 },
            deductible_contribution: deductible,
            annual_tax_saving: tax_without_deduction - annual_tax,
        }
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::sars_2025_26()
    }
}

pub fn compute_tax(policy: &TaxPolicy, annual_taxable_income: f64, age: u32) -> f64 {
    policy.assess(annual_taxable_income, age).tax
}
