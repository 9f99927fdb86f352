use super::types::{Phase, ProjectionRow, Statistics};

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn aggregate(rows: &[ProjectionRow], total_contributed: f64) -> Statistics {
    let mut total_withdrawn = 0.0;
    let mut total_tax_paid = 0.0;
    let mut value_at_retirement = None;
    let mut fund_depletion_age = None;

    for row in rows {
        total_withdrawn += row.withdrawal;
        total_tax_paid += row.tax_paid;

        // accumulating years never count as depletion
        if row.phase == Phase::Accumulating {
            continue;
        }
        if value_at_retirement.is_none() {
            value_at_retirement = Some(row.beginning_balance);
        }
        if fund_depletion_age.is_none() && row.is_depleted() {
            fund_depletion_age = Some(row.age);
        }
    }

    let final_balance = rows.last().map_or(0.0, |row| row.ending_balance);
    let net_after_tax_income = total_withdrawn - total_tax_paid;

    Statistics {
        total_contributed,
        projected_value_at_retirement: value_at_retirement.unwrap_or(final_balance),
        total_withdrawn,
        total_tax_paid,
        net_after_tax_income,
        final_balance,
        fund_depletion_age,
        wealth_retention_ratio: ratio(net_after_tax_income, total_contributed),
        effective_tax_rate: ratio(total_tax_paid, total_withdrawn) * 100.0,
    }
}
