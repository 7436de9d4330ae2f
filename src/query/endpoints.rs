//! Endpoint planner
//!
//! Given a requested half-open [start, end) window, derives the window's
//! duration in days (fractional days permitted) and the immediately
//! preceding and following windows of equal length. The three windows
//! tile the timeline: `prev.end == current.start` and
//! `current.end == next.start`.

use serde::{Deserialize, Serialize};

use crate::datetime::MS_IN_DAY;
use crate::query::error::{QueryError, QueryResult};

/// One half-open query window with its day accounting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointWindow {
    /// [start, end), epoch milliseconds
    pub range: [i64; 2],
    /// Window length in days; fractional for sub-day windows
    pub days: f64,
    /// Days of the window that survive the active-weekday filter
    pub active_days: f64,
}

impl EndpointWindow {
    fn of(range: [i64; 2]) -> Self {
        let days = (range[1] - range[0]) as f64 / MS_IN_DAY as f64;
        Self {
            range,
            days,
            active_days: days,
        }
    }

    /// Window duration in milliseconds
    pub fn span_ms(&self) -> i64 {
        self.range[1] - self.range[0]
    }
}

/// The three windows computed per query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub current: EndpointWindow,
    pub prev: EndpointWindow,
    pub next: EndpointWindow,
}

impl Endpoints {
    /// Plan the current window and its equal-length neighbors
    pub fn plan(range: [i64; 2]) -> QueryResult<Self> {
        let [start, end] = range;
        if start >= end {
            return Err(QueryError::InvalidEndpoints { start, end });
        }

        let span = end - start;
        Ok(Self {
            current: EndpointWindow::of(range),
            prev: EndpointWindow::of([start - span, start]),
            next: EndpointWindow::of([end, end + span]),
        })
    }

    /// Scale each window's active-day count for a weekday filter
    ///
    /// Uses the proportional rule `days / 7 * |active set|`, which is
    /// exact only when the window is a whole number of weeks.
    pub fn apply_active_days(&mut self, active: &[u8]) {
        for window in [&mut self.current, &mut self.prev, &mut self.next] {
            window.active_days = window.days / 7.0 * active.len() as f64;
        }
    }

    /// The windows in result order, labeled
    pub fn labeled(&self) -> [(&'static str, EndpointWindow); 3] {
        [
            ("current", self.current),
            ("next", self.next),
            ("prev", self.prev),
        ]
    }
}
