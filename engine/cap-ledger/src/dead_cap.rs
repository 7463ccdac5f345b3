//! Dead-cap retention schedule
//!
//! Pure arithmetic over contract terms. The rest of the engine calls this
//! at release time; nothing here touches the store.

use rust_decimal::Decimal;

/// Retention percentage of salary by contract length and years into the deal.
/// Row index = `years_total - 1`, column index = `target_season - start_season`.
const RETENTION_PCT: [&[i64]; 5] = [
    &[50],
    &[50, 25],
    &[60, 40, 20],
    &[70, 45, 25, 10],
    &[75, 50, 25, 10, 10],
];

/// Salary at or below this amount is a minimum deal and retains in full.
const MINIMUM_DEAL_SALARY: Decimal = Decimal::ONE;

/// Dead cap charged when a contract is released in `target_season`.
///
/// Out-of-range inputs (unknown contract length, release outside the
/// contract window) retain nothing. Minimum deals (`salary <= 1`) always
/// retain the full salary, regardless of year. Result is rounded to cents.
pub fn dead_cap_for(
    salary: Decimal,
    years_total: i32,
    start_season: i32,
    target_season: i32,
) -> Decimal {
    if salary <= MINIMUM_DEAL_SALARY {
        return salary.round_dp(2);
    }

    let schedule = match years_total {
        1..=5 => RETENTION_PCT[(years_total - 1) as usize],
        _ => return Decimal::ZERO,
    };

    let years_into = target_season - start_season;
    if years_into < 0 || years_into as usize >= schedule.len() {
        return Decimal::ZERO;
    }

    let pct = Decimal::from(schedule[years_into as usize]);
    (salary * pct / Decimal::from(100)).round_dp(2)
}
