//! Monthly and all-time usage cost counters

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

/// Calendar month the monthly counter belongs to; orders by year, then month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingMonth {
    pub year: i32,
    pub month: u32,
}

impl BillingMonth {
    pub fn of(date: &impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(&Local::now())
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub monthly: f64,
    pub all_time: f64,
    /// Month of the last monthly reset
    pub month: BillingMonth,
}

impl CostSnapshot {
    pub fn zero(month: BillingMonth) -> Self {
        Self {
            monthly: 0.0,
            all_time: 0.0,
            month,
        }
    }
}

/// Round to the precision shown to users
pub fn rounded(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Durable copy of the counters, shared with other running processes.
///
/// `update` applies `op` to the latest stored snapshot (or to `fallback` when
/// nothing is stored yet), persists the result and returns it. Implementations
/// must hold an exclusive lock from read to write.
pub trait CostLedger: Send + Sync {
    fn update(
        &self,
        fallback: CostSnapshot,
        op: &mut dyn FnMut(&mut CostSnapshot),
    ) -> Result<CostSnapshot>;
}

/// Two running sums shared by every conversation
pub struct CostAccumulator {
    state: Mutex<CostSnapshot>,
    ledger: Option<Arc<dyn CostLedger>>,
}

impl CostAccumulator {
    pub fn restore(snapshot: CostSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn snapshot(&self) -> CostSnapshot {
        *self.lock()
    }

    pub fn increment(&self, cost: f64) -> CostSnapshot {
        self.increment_at(cost, BillingMonth::current())
    }

    /// Add `cost` to both counters, starting a new monthly total first if
    /// `now` is later than the month of the last reset
    pub fn increment_at(&self, cost: f64, now: BillingMonth) -> CostSnapshot {
        self.apply(|state| {
            if now > state.month {
                log::info!("New billing month {now}, resetting monthly cost");
                state.monthly = 0.0;
                state.month = now;
            }

            state.monthly += cost;
            state.all_time += cost;
        })
    }

    pub fn reset_monthly(&self) -> CostSnapshot {
        self.reset_monthly_at(BillingMonth::current())
    }

    pub fn reset_monthly_at(&self, now: BillingMonth) -> CostSnapshot {
        log::debug!("Resetting Perplexity monthly cost");
        self.apply(|state| {
            state.monthly = 0.0;
            state.month = state.month.max(now);
        })
    }

    /// Run `op` against the ledger when there is one, otherwise (or when the
    /// ledger fails) against the in-memory counters only
    fn apply(&self, mut op: impl FnMut(&mut CostSnapshot)) -> CostSnapshot {
        let mut state = self.lock();

        if let Some(ledger) = &self.ledger {
            match ledger.update(*state, &mut op) {
                Ok(stored) => {
                    *state = stored;
                    return stored;
                }
                Err(err) => log::warn!("Could not persist cost counters: {err:#}"),
            }
        }

        op(&mut *state);
        *state
    }

    fn lock(&self) -> MutexGuard<'_, CostSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
