use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    First,
    Second,
    Third,
    Backlog,
}

impl Shift {
    /// Shift window for a local wall-clock hour.
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            4..=11 => Shift::First,
            12..=19 => Shift::Second,
            _ => Shift::Third,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::First => "First",
            Shift::Second => "Second",
            Shift::Third => "Third",
            Shift::Backlog => "Backlog",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to a fixed UTC offset. Shift windows are defined in
/// the depot's local time, not the device's.
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(|offset| Self { offset })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<FixedOffset>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub fn current_shift(now: DateTime<FixedOffset>) -> Shift {
    Shift::for_hour(now.hour())
}

pub struct ShiftSelector {
    clock: Arc<dyn Clock>,
    selected: Shift,
}

impl ShiftSelector {
    /// Starts on the shift the clock is currently in.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let selected = current_shift(clock.now());
        Self { clock, selected }
    }

    pub fn selected(&self) -> Shift {
        self.selected
    }

    pub fn current(&self) -> Shift {
        current_shift(self.clock.now())
    }

    /// Returns true when the selection actually changed.
    pub fn select_shift(&mut self, shift: Shift) -> bool {
        let changed = self.selected != shift;
        self.selected = shift;
        changed
    }

    /// Mutating actions are only allowed on the backlog or the shift we are in.
    pub fn guard(&self) -> Result<(), Error> {
        let current = self.current();
        if self.selected == Shift::Backlog || self.selected == current {
            Ok(())
        } else {
            Err(Error::InvalidShift {
                selected: self.selected,
                current,
            })
        }
    }
}
