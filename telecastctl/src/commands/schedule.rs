use chrono::{DateTime, Utc};
use serde::Serialize;
use telecast_core::{next_up, playback_position, Channel, PlaybackPosition};

use crate::commands::channel::{load_channel, open_store};
use crate::{AppError, Cli, OutputFormat, Result, ScheduleArgs, ScheduleCommands};

#[derive(Debug, Serialize)]
struct SlotReport {
    channel: String,
    evaluated_at: DateTime<Utc>,
    index: usize,
    item_id: String,
    title: String,
    offset_s: f64,
    remaining_s: f64,
}

impl SlotReport {
    fn new(channel: &Channel, at: DateTime<Utc>, position: &PlaybackPosition<'_>) -> Self {
        Self {
            channel: channel.name.clone(),
            evaluated_at: at,
            index: position.index,
            item_id: position.item.id.clone(),
            title: position.item.title.clone(),
            offset_s: position.offset_s,
            remaining_s: (position.item.duration_s - position.offset_s).max(0.0),
        }
    }
}

pub fn execute(cli: &Cli, command: &ScheduleCommands) -> Result<()> {
    let store = open_store(cli)?;
    let (args, upcoming) = match command {
        ScheduleCommands::Now(args) => (args, false),
        ScheduleCommands::Next(args) => (args, true),
    };
    let channel = load_channel(&store, &args.id)?;
    let at = parse_instant(args.at.as_deref())?;

    let position = if upcoming {
        next_up(&channel, at)
    } else {
        playback_position(&channel, at)
    };
    let Some(position) = position else {
        // Empty or zero-duration playlists have no schedule; that is an
        // expected state, not a failure.
        println!("channel {} has no schedule", channel.name);
        return Ok(());
    };

    let report = SlotReport::new(&channel, at, &position);
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "{}: [{}] {} at {:.0}s ({:.0}s remaining)",
            report.channel, report.index, report.title, report.offset_s, report.remaining_s
        ),
    }
    Ok(())
}

fn parse_instant(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => raw
            .parse::<DateTime<Utc>>()
            .map_err(|_| AppError::InvalidArgument(format!("not an RFC 3339 instant: {raw}"))),
    }
}
