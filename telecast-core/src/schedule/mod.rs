//! Deterministic schedule math. Playback position is derived from elapsed
//! wall-clock time against the channel anchor on every call; nothing here
//! caches or mutates.

use chrono::{DateTime, Utc};

use crate::channel::{Channel, MediaItem};

/// The active slot of a channel at some instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition<'a> {
    pub index: usize,
    pub item: &'a MediaItem,
    /// Seconds into the active item, `0 <= offset_s < item.duration_s`.
    pub offset_s: f64,
}

/// Resolve what a channel is playing at `instant`.
///
/// Returns `None` when the channel has no defined schedule: an empty
/// playlist or a non-positive total duration. Callers treat that as an
/// expected transient state, not a failure.
pub fn playback_position(channel: &Channel, instant: DateTime<Utc>) -> Option<PlaybackPosition<'_>> {
    let total = channel.total_duration_s();
    if channel.items.is_empty() || total <= 0.0 {
        return None;
    }

    let elapsed = (instant - channel.schedule_anchor)
        .num_milliseconds()
        .max(0) as f64
        / 1000.0;
    let mut position = elapsed % total;

    for (index, item) in channel.items.iter().enumerate() {
        let duration = item.duration_s.max(0.0);
        if position < duration {
            return Some(PlaybackPosition {
                index,
                item,
                offset_s: position,
            });
        }
        position -= duration;
    }

    // Modulo bounds position below the total, so the walk always lands on an
    // item unless float error accumulates at the loop seam.
    let index = channel.items.len() - 1;
    Some(PlaybackPosition {
        index,
        item: &channel.items[index],
        offset_s: 0.0,
    })
}

/// The item scheduled after the one active at `instant`, wrapping to the
/// first item past the end of the loop.
pub fn next_up(channel: &Channel, instant: DateTime<Utc>) -> Option<PlaybackPosition<'_>> {
    let active = playback_position(channel, instant)?;
    let index = (active.index + 1) % channel.items.len();
    Some(PlaybackPosition {
        index,
        item: &channel.items[index],
        offset_s: 0.0,
    })
}
