// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed enumerations and the event type the store owns per pane.

use serde::{Deserialize, Serialize};

/// Instants are kept as epoch milliseconds throughout the store; ISO-8601
/// formatting (if ever needed) is a presentation-layer concern only.
pub type TimeMs = u64;

/// A pane's classified execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateValue {
    Running,
    WaitingInput,
    WaitingPermission,
    Shell,
    Unknown,
}

impl StateValue {
    /// Dominance order used by the aggregator: first match wins.
    pub const PRIORITY: [StateValue; 5] = [
        StateValue::WaitingPermission,
        StateValue::Running,
        StateValue::WaitingInput,
        StateValue::Shell,
        StateValue::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::WaitingInput => "WAITING_INPUT",
            Self::WaitingPermission => "WAITING_PERMISSION",
            Self::Shell => "SHELL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// The origin of a state-transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// External process hook. Authoritative.
    Hook,
    /// Periodic observer.
    Poll,
    /// Rebuilt from a persisted snapshot.
    Restore,
}

impl Source {
    /// Dominance order used by the aggregator: hook, then restore, then poll.
    pub fn dominates(self, other: Source) -> bool {
        self.rank() < other.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Source::Hook => 0,
            Source::Restore => 1,
            Source::Poll => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hook => "hook",
            Self::Poll => "poll",
            Self::Restore => "restore",
        }
    }
}

/// A fixed-width query window ending at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeTag {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "3h")]
    ThreeHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    SevenDays,
}

impl RangeTag {
    pub fn width_ms(&self) -> u64 {
        match self {
            Self::FifteenMinutes => 900_000,
            Self::OneHour => 3_600_000,
            Self::ThreeHours => 10_800_000,
            Self::SixHours => 21_600_000,
            Self::TwentyFourHours => 86_400_000,
            Self::ThreeDays => 259_200_000,
            Self::SevenDays => 604_800_000,
        }
    }

    /// Default item cap when the caller does not supply an explicit `limit`.
    pub fn default_limit(&self) -> usize {
        match self {
            Self::FifteenMinutes => 200,
            Self::OneHour => 300,
            Self::ThreeHours => 700,
            Self::SixHours => 1500,
            Self::TwentyFourHours => 5000,
            Self::ThreeDays => 7000,
            Self::SevenDays => 10_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::ThreeHours => "3h",
            Self::SixHours => "6h",
            Self::TwentyFourHours => "24h",
            Self::ThreeDays => "3d",
            Self::SevenDays => "7d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "15m" => Self::FifteenMinutes,
            "1h" => Self::OneHour,
            "3h" => Self::ThreeHours,
            "6h" => Self::SixHours,
            "24h" => Self::TwentyFourHours,
            "3d" => Self::ThreeDays,
            "7d" => Self::SevenDays,
            _ => return None,
        })
    }
}

/// One stored state-transition event for a pane.
///
/// `ended_at` of `None` means "still current" (an open event). At most one
/// event per pane may be open, and it must be the last in ascending
/// `started_at` order — see `TimelineStore` for the enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// `<paneId>:<startedAtMs>:<sequence>`.
    pub id: String,
    pub pane_id: String,
    pub state: StateValue,
    pub reason: String,
    pub source: Source,
    pub repo_root: Option<String>,
    pub started_at: TimeMs,
    pub ended_at: Option<TimeMs>,
}

impl TimelineEvent {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// The effective end boundary for ordering purposes: `ended_at` if
    /// closed, else `started_at` (an open event has no later boundary yet).
    pub fn end_boundary(&self) -> TimeMs {
        self.ended_at.unwrap_or(self.started_at)
    }
}

/// Build an event id of shape `<paneId>:<startedAtMs>:<sequence>`.
pub fn make_id(pane_id: &str, started_at_ms: TimeMs, sequence: u64) -> String {
    format!("{pane_id}:{started_at_ms}:{sequence}")
}

/// Recover the `sequence` suffix from an id produced by [`make_id`].
///
/// Tolerates a non-integer suffix by defaulting to `0` (lenient, per the
/// accepted open question in the spec this crate implements) rather than
/// rejecting the event.
pub fn parse_sequence_from_id(id: &str) -> u64 {
    id.rsplit(':').next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
