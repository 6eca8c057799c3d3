use std::{collections::BTreeMap, str::FromStr};

use chrono::{Days, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

use crate::domain::value_objects::enums::interval_units::IntervalUnit;

/// Plans offered when `INSTALLMENT_PLAN_INTERVALS` is not configured.
pub const DEFAULT_PLAN_INTERVALS: &str = "3:month,6:month,12:month,24:month";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstallmentError {
    #[error("invalid installment interval: {0}")]
    InvalidInterval(String),
    #[error("installment count must be at least 1")]
    InvalidInstallmentCount,
    #[error("invalid installment plan selection: {0}")]
    InvalidPlanSelection(String),
    #[error("invalid installment plan configuration: {0}")]
    InvalidPlanConfig(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("missing related entity: {0}")]
    MissingRelatedEntity(String),
    #[error("installment date out of range")]
    DateOutOfRange,
}

/// Due dates of every installment, the first one being `start` itself.
///
/// Each date advances from the previous one by a single `interval`. Month and
/// year steps clamp to the last day of the target month, so 2024-01-31 is
/// followed by 2024-02-29.
pub fn generate_installment_dates(
    start: NaiveDate,
    count: u32,
    interval: IntervalUnit,
) -> Result<Vec<NaiveDate>, InstallmentError> {
    if count == 0 {
        return Err(InstallmentError::InvalidInstallmentCount);
    }

    let mut dates = Vec::with_capacity(count as usize);
    let mut current = start;
    dates.push(current);

    for _ in 1..count {
        current = advance(current, interval).ok_or(InstallmentError::DateOutOfRange)?;
        dates.push(current);
    }

    Ok(dates)
}

fn advance(date: NaiveDate, interval: IntervalUnit) -> Option<NaiveDate> {
    match interval {
        IntervalUnit::Day => date.checked_add_days(Days::new(1)),
        IntervalUnit::Week => date.checked_add_days(Days::new(7)),
        IntervalUnit::Month => date.checked_add_months(Months::new(1)),
        IntervalUnit::Year => date.checked_add_months(Months::new(12)),
    }
}

/// Renders a due date the way the payment page shows it, e.g. `January 31, 2024`.
pub fn format_installment_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Configured mapping from installment count to the interval it is billed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanIntervals(BTreeMap<u32, IntervalUnit>);

impl PlanIntervals {
    pub fn new(entries: impl IntoIterator<Item = (u32, IntervalUnit)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn interval_for(&self, count: u32) -> Option<IntervalUnit> {
        self.0.get(&count).copied()
    }

    pub fn counts(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }
}

impl Default for PlanIntervals {
    fn default() -> Self {
        DEFAULT_PLAN_INTERVALS
            .parse()
            .unwrap_or_else(|_| Self(BTreeMap::new()))
    }
}

impl FromStr for PlanIntervals {
    type Err = InstallmentError;

    /// Parses comma separated `count:interval` pairs, e.g. `3:day,6:month`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut entries = BTreeMap::new();

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (count, interval) = pair.split_once(':').ok_or_else(|| {
                InstallmentError::InvalidPlanConfig(format!("malformed plan entry `{pair}`"))
            })?;

            let count: u32 = count.trim().parse().map_err(|_| {
                InstallmentError::InvalidPlanConfig(format!("malformed plan count `{count}`"))
            })?;
            if count == 0 {
                return Err(InstallmentError::InvalidPlanConfig(
                    "plan count must be at least 1".to_string(),
                ));
            }

            let interval: IntervalUnit = interval.parse()?;
            if entries.insert(count, interval).is_some() {
                return Err(InstallmentError::InvalidPlanConfig(format!(
                    "duplicate plan count {count}"
                )));
            }
        }

        Ok(Self(entries))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPlan {
    pub count: u32,
    pub interval: IntervalUnit,
    pub per_installment_amount: Decimal,
}

impl InstallmentPlan {
    /// What the customer ends up paying; may drift from the order total by rounding.
    pub fn total_charged(&self) -> Decimal {
        self.per_installment_amount * Decimal::from(self.count)
    }
}

/// Picks the plan for `chosen` installments out of the counts the order allows.
pub fn select_plan(
    total_amount: Decimal,
    allowed_counts: &[u32],
    chosen: u32,
    intervals: &PlanIntervals,
) -> Result<InstallmentPlan, InstallmentError> {
    if chosen == 0 {
        return Err(InstallmentError::InvalidInstallmentCount);
    }
    if !allowed_counts.contains(&chosen) {
        return Err(InstallmentError::InvalidPlanSelection(format!(
            "{chosen} installments is not offered for this order"
        )));
    }
    if total_amount <= Decimal::ZERO {
        return Err(InstallmentError::InvalidAmount(total_amount.to_string()));
    }

    let interval = intervals.interval_for(chosen).ok_or_else(|| {
        InstallmentError::InvalidPlanSelection(format!(
            "no billing interval configured for {chosen} installments"
        ))
    })?;

    let per_installment_amount = (total_amount / Decimal::from(chosen))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(InstallmentPlan {
        count: chosen,
        interval,
        per_installment_amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentDueDate {
    pub date: NaiveDate,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPreview {
    pub installments: u32,
    pub interval: IntervalUnit,
    pub per_installment_amount: Decimal,
    pub total_charged: Decimal,
    pub due_dates: Vec<InstallmentDueDate>,
}

impl InstallmentPreview {
    pub fn build(plan: &InstallmentPlan, start: NaiveDate) -> Result<Self, InstallmentError> {
        let due_dates = generate_installment_dates(start, plan.count, plan.interval)?
            .into_iter()
            .map(|date| InstallmentDueDate {
                date,
                label: format_installment_date(date),
            })
            .collect();

        Ok(Self {
            installments: plan.count,
            interval: plan.interval,
            per_installment_amount: plan.per_installment_amount,
            total_charged: plan.total_charged(),
            due_dates,
        })
    }
}
