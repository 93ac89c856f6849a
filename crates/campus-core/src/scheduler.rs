//! Cooperative tick scheduling for live metrics.
//!
//! The scheduler owns every recurring timer on a single logical clock
//! (milliseconds). Timers are created through a [`ViewScope`], and handing
//! the scope back to [`TickScheduler::deactivate`] cancels every timer it
//! created. A cancelled timer never ticks again.
//!
//! # Example
//!
//! ```
//! use campus_core::live::MetricSpec;
//! use campus_core::noise::SeededNoise;
//! use campus_core::scheduler::TickScheduler;
//!
//! let mut scheduler = TickScheduler::new();
//! let mut scope = scheduler.open_scope("overview");
//! let id = scheduler.register(&mut scope, &MetricSpec::new("kw", 420.0, 5.0, 20.0, 100.0, 800.0), 1200);
//!
//! let mut noise = SeededNoise::new(1);
//! let events = scheduler.advance_to(3600, &mut noise);
//! assert_eq!(events.len(), 3);
//!
//! assert_eq!(scheduler.deactivate(scope), 1);
//! assert!(scheduler.advance_to(10_000, &mut noise).is_empty());
//! assert!(scheduler.value(id).is_none());
//! ```

use crate::live::{BoundedRandomWalk, MetricSpec};
use crate::noise::NoiseSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tick period used when none (or zero) is configured.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1200;

/// Longest tick period a manifest or the command line may configure (one day).
pub const MAX_TICK_INTERVAL_MS: u64 = 86_400_000;

/// Handle to a registered recurring timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Identifier of a view scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

/// The set of timers owned by one active view.
///
/// A scope can only be closed by passing it by value to
/// [`TickScheduler::deactivate`]. Dropping a scope that still owns timers
/// leaves them running and logs a warning.
#[derive(Debug)]
#[must_use = "a view scope must be deactivated to cancel its timers"]
pub struct ViewScope {
    id: ScopeId,
    label: String,
    timers: Vec<TimerId>,
}

impl ViewScope {
    /// Scope identifier.
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Human-readable view label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Timers registered through this scope.
    pub fn timers(&self) -> &[TimerId] {
        &self.timers
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        if !self.timers.is_empty() {
            warn!(
                view = %self.label,
                timers = self.timers.len(),
                "view scope dropped without deactivation; its timers keep running"
            );
        }
    }
}

/// A single metric update produced by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    /// Timer that fired
    pub timer: TimerId,
    /// Metric name
    pub metric: String,
    /// Value after the tick
    pub value: f64,
    /// Logical time of the tick
    pub at_ms: u64,
}

#[derive(Debug)]
struct RecurringTimer {
    id: TimerId,
    scope: ScopeId,
    walk: BoundedRandomWalk,
    interval_ms: u64,
    /// `None` once the next period would pass the end of the clock.
    next_due_ms: Option<u64>,
}

/// Owner of all live-metric timers.
#[derive(Debug, Default)]
pub struct TickScheduler {
    timers: Vec<RecurringTimer>,
    now_ms: u64,
    next_timer: u64,
    next_scope: u64,
    total_ticks: u64,
}

impl TickScheduler {
    /// Create a scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new scope for a view that is becoming active.
    pub fn open_scope(&mut self, label: impl Into<String>) -> ViewScope {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        ViewScope {
            id,
            label: label.into(),
            timers: Vec::new(),
        }
    }

    /// Register a recurring walk owned by `scope`.
    ///
    /// The first tick is due one interval after the current time. A zero
    /// interval falls back to [`DEFAULT_TICK_INTERVAL_MS`]. A timer whose
    /// next period lies beyond `u64::MAX` is never due again.
    pub fn register(&mut self, scope: &mut ViewScope, spec: &MetricSpec, interval_ms: u64) -> TimerId {
        let interval_ms = if interval_ms == 0 {
            DEFAULT_TICK_INTERVAL_MS
        } else {
            interval_ms
        };
        let id = TimerId(self.next_timer);
        self.next_timer += 1;

        self.timers.push(RecurringTimer {
            id,
            scope: scope.id,
            walk: BoundedRandomWalk::new(spec),
            interval_ms,
            next_due_ms: self.now_ms.checked_add(interval_ms),
        });
        scope.timers.push(id);
        id
    }

    /// Cancel a single timer. Returns `false` if it was not registered.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    /// Close a scope, cancelling every timer it owns.
    ///
    /// Returns the number of timers cancelled.
    pub fn deactivate(&mut self, mut scope: ViewScope) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.scope != scope.id);
        scope.timers.clear();
        let cancelled = before - self.timers.len();
        info!(view = %scope.label, cancelled, "view deactivated");
        cancelled
    }

    /// Advance the clock to `now_ms`, firing every due tick in time order.
    ///
    /// A timer that missed several periods fires once per missed period.
    /// Ties at the same instant fire in registration order. Moving the
    /// clock backwards is ignored.
    pub fn advance_to(&mut self, now_ms: u64, noise: &mut dyn NoiseSource) -> Vec<TickEvent> {
        if now_ms <= self.now_ms {
            return Vec::new();
        }

        let mut events = Vec::new();
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter_map(|(idx, t)| t.next_due_ms.map(|due| (due, idx)))
                .filter(|(due, _)| *due <= now_ms)
                .min();

            let Some((at_ms, idx)) = due else { break };
            let timer = &mut self.timers[idx];
            let value = timer.walk.tick(noise);
            timer.next_due_ms = at_ms.checked_add(timer.interval_ms);
            events.push(TickEvent {
                timer: timer.id,
                metric: timer.walk.name().to_string(),
                value,
                at_ms,
            });
        }

        self.now_ms = now_ms;
        self.total_ticks += events.len() as u64;
        if !events.is_empty() {
            debug!(now_ms, fired = events.len(), "timers advanced");
        }
        events
    }

    /// Advance the clock by `delta_ms`.
    pub fn advance_by(&mut self, delta_ms: u64, noise: &mut dyn NoiseSource) -> Vec<TickEvent> {
        self.advance_to(self.now_ms.saturating_add(delta_ms), noise)
    }

    /// Current value of a live timer's metric.
    #[must_use]
    pub fn value(&self, id: TimerId) -> Option<f64> {
        self.walk(id).map(BoundedRandomWalk::value)
    }

    /// The walk behind a live timer.
    #[must_use]
    pub fn walk(&self, id: TimerId) -> Option<&BoundedRandomWalk> {
        self.timers.iter().find(|t| t.id == id).map(|t| &t.walk)
    }

    /// Whether a timer is still registered.
    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    /// Number of registered timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Current logical time.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Total ticks fired over the scheduler's lifetime.
    #[must_use]
    pub const fn total_ticks(&self) -> u64 {
        self.total_ticks
    }
}
