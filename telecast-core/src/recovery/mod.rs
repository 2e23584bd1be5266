//! Adaptive recovery for degraded playback: a telemetry-driven downshift
//! ladder over the active stream plan.
//!
//! Transition logic is a pure function of (state, event, now) so the
//! ladder is testable without the event loop; `RecoverySupervisor` owns
//! the loop and the resolver handoff.

mod supervisor;

use chrono::{DateTime, Duration, Utc};

use crate::config::RecoverySection;
use crate::stream::StreamPlan;

pub use supervisor::{PlaybackHandle, RecoveryError, RecoveryResult, RecoverySupervisor};

/// Playback telemetry consumed by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryEvent {
    /// Explicit stall notification from the playback surface.
    Stall,
    /// Periodic throughput sample.
    Throughput {
        observed_kbps: u32,
        indicated_kbps: u32,
    },
}

/// What the controller wants done in response to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryDecision {
    NoAction,
    Replan(ReplanRequest),
    /// Ladder floor reached without improvement; fatal for this attempt.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplanRequest {
    pub bitrate_cap_kbps: u32,
    pub force_transcode: bool,
}

/// Mutable per-attempt session state. Ladder counters survive recoveries
/// of the same item; rolling telemetry state resets with each new attempt.
#[derive(Debug, Clone)]
pub struct AdaptiveState {
    pub bitrate_cap_kbps: u32,
    pub downshifts: u32,
    pub forced_transcode: bool,
    pub stream_copy: bool,
    pub low_throughput_since: Option<DateTime<Utc>>,
    pub last_recovery_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub exhausted: bool,
}

impl AdaptiveState {
    /// Fresh state for a plan that just began playback.
    pub fn for_plan(plan: &StreamPlan, config: &RecoverySection, now: DateTime<Utc>) -> Self {
        Self {
            bitrate_cap_kbps: plan
                .negotiation
                .bitrate_cap_kbps
                .unwrap_or(config.forced_transcode_start_kbps),
            downshifts: 0,
            forced_transcode: plan.options.force_transcode,
            stream_copy: plan.is_stream_copy(),
            low_throughput_since: None,
            last_recovery_at: None,
            started_at: now,
            exhausted: false,
        }
    }

    /// A recovery produced a new plan and playback restarted from it:
    /// clear the rolling telemetry state and re-anchor the attempt clock,
    /// keeping the ladder counters.
    pub fn reset_attempt(&mut self, plan: &StreamPlan, now: DateTime<Utc>) {
        if let Some(cap) = plan.negotiation.bitrate_cap_kbps {
            self.bitrate_cap_kbps = cap;
        }
        self.stream_copy = plan.is_stream_copy();
        self.low_throughput_since = None;
        self.started_at = now;
        self.last_recovery_at = Some(now);
    }

    fn in_cooldown(&self, now: DateTime<Utc>, config: &RecoverySection) -> bool {
        self.last_recovery_at
            .map(|at| now - at < Duration::seconds(config.cooldown_seconds as i64))
            .unwrap_or(false)
    }
}

/// Advance the state machine by one event.
pub fn on_event(
    state: &mut AdaptiveState,
    event: &TelemetryEvent,
    now: DateTime<Utc>,
    config: &RecoverySection,
) -> RecoveryDecision {
    if state.exhausted {
        return RecoveryDecision::NoAction;
    }
    match event {
        TelemetryEvent::Stall => {
            let into_attempt = now - state.started_at;
            if into_attempt > Duration::seconds(config.late_stall_cutoff_seconds as i64) {
                // A stall this deep into playback is a different failure
                // class; do not burn a ladder step on it.
                tracing::debug!(
                    target: "recovery",
                    seconds = into_attempt.num_seconds(),
                    "late stall ignored"
                );
                return RecoveryDecision::NoAction;
            }
            if state.in_cooldown(now, config) {
                return RecoveryDecision::NoAction;
            }
            downshift(state, now, config)
        }
        TelemetryEvent::Throughput {
            observed_kbps,
            indicated_kbps,
        } => {
            let healthy =
                (*observed_kbps as f64) >= (*indicated_kbps as f64) * config.throughput_ratio;
            if healthy {
                state.low_throughput_since = None;
                return RecoveryDecision::NoAction;
            }
            let since = *state.low_throughput_since.get_or_insert(now);
            let sustained =
                now - since >= Duration::seconds(config.throughput_window_seconds as i64);
            if !sustained || state.in_cooldown(now, config) {
                return RecoveryDecision::NoAction;
            }
            downshift(state, now, config)
        }
    }
}

fn downshift(
    state: &mut AdaptiveState,
    now: DateTime<Utc>,
    config: &RecoverySection,
) -> RecoveryDecision {
    if state.stream_copy && !state.forced_transcode {
        // Nothing is being re-encoded, so there is no bitrate to reduce;
        // the only move is a full transcode at the fixed starting cap.
        state.forced_transcode = true;
        state.stream_copy = false;
        state.bitrate_cap_kbps = config.forced_transcode_start_kbps;
    } else if state.forced_transcode {
        let reduced = reduce(state.bitrate_cap_kbps, config.later_reduction_percent)
            .max(config.floor_kbps);
        if reduced >= state.bitrate_cap_kbps {
            state.exhausted = true;
            tracing::warn!(
                target: "recovery",
                cap = state.bitrate_cap_kbps,
                "ladder exhausted at floor"
            );
            return RecoveryDecision::Exhausted;
        }
        state.bitrate_cap_kbps = reduced;
    } else if state.downshifts >= config.escalate_after_downshifts {
        state.forced_transcode = true;
    } else {
        let percent = if state.downshifts == 0 {
            config.first_reduction_percent
        } else {
            config.later_reduction_percent
        };
        let reduced = reduce(state.bitrate_cap_kbps, percent).max(config.floor_kbps);
        if reduced >= state.bitrate_cap_kbps {
            state.forced_transcode = true;
        } else {
            state.bitrate_cap_kbps = reduced;
        }
    }
    state.downshifts += 1;
    state.last_recovery_at = Some(now);
    state.low_throughput_since = None;
    tracing::info!(
        target: "recovery",
        cap = state.bitrate_cap_kbps,
        downshifts = state.downshifts,
        forced = state.forced_transcode,
        "downshift requested"
    );
    RecoveryDecision::Replan(ReplanRequest {
        bitrate_cap_kbps: state.bitrate_cap_kbps,
        force_transcode: state.forced_transcode,
    })
}

fn reduce(cap: u32, percent: u32) -> u32 {
    (cap as u64 * (100 - percent.min(100)) as u64 / 100) as u32
}
