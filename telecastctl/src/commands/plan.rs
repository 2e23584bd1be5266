use std::fs;

use serde::Serialize;
use telecast_core::stream::assess_compatibility;
use telecast_core::{DeliveryMode, TechnicalMetadata, TelecastConfig};

use crate::{Cli, OutputFormat, PlanCommands, PlanDryRunArgs, Result};

#[derive(Debug, Serialize)]
struct DryRunReport {
    video_ok: bool,
    audio_ok: bool,
    container_ok: bool,
    mode: DeliveryMode,
    stream_copy: bool,
    reason: String,
}

pub fn execute(cli: &Cli, config: &TelecastConfig, command: &PlanCommands) -> Result<()> {
    match command {
        PlanCommands::DryRun(args) => dry_run(cli, config, args),
    }
}

fn dry_run(cli: &Cli, config: &TelecastConfig, args: &PlanDryRunArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.metadata)?;
    let meta: TechnicalMetadata = serde_json::from_str(&raw)?;
    let verdict = assess_compatibility(&meta, &config.stream);

    let (mode, stream_copy) = if args.force_remux {
        (DeliveryMode::AdaptiveStream, verdict.container_ok)
    } else if verdict.passthrough_eligible() {
        (DeliveryMode::DirectPlay, false)
    } else {
        (DeliveryMode::AdaptiveStream, false)
    };

    let report = DryRunReport {
        video_ok: verdict.video_ok,
        audio_ok: verdict.audio_ok,
        container_ok: verdict.container_ok,
        mode,
        stream_copy,
        reason: verdict.reason,
    };
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "mode={}{} ({})",
            report.mode,
            if report.stream_copy { " [stream copy]" } else { "" },
            report.reason
        ),
    }
    Ok(())
}
