use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::sales::SaleRecord;

const UNKNOWN_DAY: &str = "unknown";
const DASHBOARD_WINDOW_DAYS: i64 = 7;

/// Report period: a trailing number of days or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Days(u32),
    All,
}

impl DateRange {
    pub const DEFAULT: DateRange = DateRange::Days(30);

    /// Parse leniently: anything that is neither `all` nor a positive day count
    /// falls back to the default.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or(Self::DEFAULT)
    }

    /// First instant inside the range, `None` when it reaches back past any representable date.
    fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::All => None,
            DateRange::Days(days) => Duration::try_days(i64::from(*days)).and_then(|d| now.checked_sub_signed(d)),
        }
    }

    /// Undated records are always kept.
    pub fn includes(&self, date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self.start(now), date) {
            (None, _) | (_, None) => true,
            (Some(start), Some(date)) => date >= start,
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::All),
            s => match s.parse::<u32>() {
                Ok(days) if days > 0 => Ok(Self::Days(days)),
                _ => Err(format!("Invalid range: {s}")),
            },
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::Days(days) => write!(f, "{days}"),
            DateRange::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySales {
    /// `YYYY-MM-DD`, or `unknown` for undated records
    pub date: String,
    pub amount: Decimal,
}

fn day_key(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DAY.to_string())
}

/// Sales per observed UTC day, ascending. Days without activity are absent.
pub fn daily_sales_sparse<'a>(records: impl IntoIterator<Item = &'a SaleRecord>) -> Vec<DailySales> {
    let mut days: BTreeMap<String, Decimal> = BTreeMap::new();
    for record in records {
        *days.entry(day_key(record.order_date)).or_default() += record.total;
    }
    days.into_iter()
        .map(|(date, amount)| DailySales { date, amount: amount.round_dp(2) })
        .collect()
}

/// Sales for the seven UTC days ending at `today`, zero-filled, oldest first.
pub fn daily_sales_trailing_week<'a>(
    records: impl IntoIterator<Item = &'a SaleRecord>,
    today: NaiveDate,
) -> Vec<DailySales> {
    let first = today - Duration::days(DASHBOARD_WINDOW_DAYS - 1);
    let mut days: BTreeMap<NaiveDate, Decimal> = (0..DASHBOARD_WINDOW_DAYS)
        .map(|offset| (first + Duration::days(offset), Decimal::ZERO))
        .collect();
    for record in records {
        let Some(date) = record.order_date.map(|d| d.date_naive()) else {
            continue;
        };
        if let Some(amount) = days.get_mut(&date) {
            *amount += record.total;
        }
    }
    days.into_iter()
        .map(|(date, amount)| DailySales {
            date: date.format("%Y-%m-%d").to_string(),
            amount: amount.round_dp(2),
        })
        .collect()
}
