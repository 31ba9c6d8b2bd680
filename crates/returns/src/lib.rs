//! Forward returns anchored to earnings call dates.

use chrono::NaiveDate;
use tracing::debug;

use earnings_core::utils::normalize_ticker;
use earnings_core::{EarningsError, HorizonReturn, NullReason, PriceSeries, Result, ReturnRecord};

pub const DEFAULT_HORIZONS: [usize; 3] = [1, 5, 10];

/// Computes `close[event + N] / close[event] - 1` for each horizon N, where
/// the event day is the first trading day on or after the call date.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnCalculator {
    horizons: Vec<usize>,
    max_event_lag_days: Option<u32>,
}

impl Default for ReturnCalculator {
    fn default() -> Self {
        Self {
            horizons: DEFAULT_HORIZONS.to_vec(),
            max_event_lag_days: None,
        }
    }
}

impl ReturnCalculator {
    /// Horizons are de-duplicated and sorted; they must be non-empty and positive.
    pub fn new(horizons: &[usize], max_event_lag_days: Option<u32>) -> Result<Self> {
        if horizons.is_empty() {
            return Err(EarningsError::Config("at least one return horizon is required".into()));
        }
        if horizons.contains(&0) {
            return Err(EarningsError::Config("return horizons must be positive".into()));
        }
        let mut horizons = horizons.to_vec();
        horizons.sort_unstable();
        horizons.dedup();
        Ok(Self {
            horizons,
            max_event_lag_days,
        })
    }

    pub fn horizons(&self) -> &[usize] {
        &self.horizons
    }

    /// Index of the event day, honoring the maximum lag when set.
    pub fn event_index(&self, series: &PriceSeries, call_date: NaiveDate) -> Option<usize> {
        let idx = series.first_on_or_after(call_date)?;
        let lag = (series.points()[idx].date - call_date).num_days();
        match self.max_event_lag_days {
            Some(max) if lag > i64::from(max) => None,
            _ => Some(idx),
        }
    }

    pub fn compute(&self, series: &PriceSeries, call_date: NaiveDate) -> ReturnRecord {
        let Some(event) = self.event_index(series, call_date) else {
            debug!(
                "{} {}: no trading day on or after the call (last price {:?})",
                series.ticker(),
                call_date,
                series.last_date()
            );
            return self.all_null(series.ticker(), call_date, NullReason::NoEventDay);
        };

        let points = series.points();
        let base = points[event].close;
        let returns = self
            .horizons
            .iter()
            .map(|&h| match event.checked_add(h).and_then(|i| points.get(i)) {
                Some(later) => HorizonReturn::computed(h, later.close / base - 1.0),
                None => HorizonReturn::null(h, NullReason::InsufficientTradingDays),
            })
            .collect();

        ReturnRecord {
            ticker: series.ticker().to_string(),
            call_date,
            event_day: Some(points[event].date),
            returns,
        }
    }

    /// Record for a call whose prices could not be used at all.
    pub fn not_computed(&self, ticker: &str, call_date: NaiveDate) -> ReturnRecord {
        self.all_null(ticker, call_date, NullReason::NotComputed)
    }

    fn all_null(&self, ticker: &str, call_date: NaiveDate, reason: NullReason) -> ReturnRecord {
        ReturnRecord {
            ticker: normalize_ticker(ticker),
            call_date,
            event_day: None,
            returns: self
                .horizons
                .iter()
                .map(|&h| HorizonReturn::null(h, reason))
                .collect(),
        }
    }
}
