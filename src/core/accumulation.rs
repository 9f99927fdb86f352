use super::types::AccumulationResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct YearFlow {
    pub ending_balance: f64,
    pub contribution: f64,
    pub investment_return: f64,
}

pub(crate) fn escalation(inflation_pct: f64, years: u32) -> f64 {
    (1.0 + inflation_pct / 100.0).powi(years as i32)
}

pub(crate) fn accumulate_months(
    balance: f64,
    monthly_contribution: f64,
    monthly_rate: f64,
    months: u32,
) -> YearFlow {
    let mut balance = balance;
    let mut contribution = 0.0;
    let mut investment_return = 0.0;

    for _ in 0..months {
        let growth = balance * monthly_rate;
        balance += growth;
        investment_return += growth;

        balance += monthly_contribution;
        contribution += monthly_contribution;
    }

    YearFlow {
        ending_balance: balance,
        contribution,
        investment_return,
    }
}

pub fn accumulate(
    starting_balance: f64,
    monthly_contribution: f64,
    annual_return_pct: f64,
    inflation_pct: f64,
    months: u32,
) -> AccumulationResult {
    let monthly_rate = annual_return_pct / 100.0 / 12.0;
    let mut balance = starting_balance;
    let mut total_contributed = 0.0;

    let mut elapsed = 0;
    while elapsed < months {
        let year = elapsed / 12;
        let span = (months - elapsed).min(12);
        let flow = accumulate_months(
            balance,
            monthly_contribution * escalation(inflation_pct, year),
            monthly_rate,
            span,
        );
        balance = flow.ending_balance;
        total_contributed += flow.contribution;
        elapsed += span;
    }

    AccumulationResult {
        final_balance: balance,
        total_contributed,
    }
}
