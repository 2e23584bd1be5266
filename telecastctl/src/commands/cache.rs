use std::fs;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use telecast_core::TelecastConfig;

use crate::{CacheCommands, CachePurgeArgs, Cli, OutputFormat, Result};

#[derive(Debug, Serialize)]
struct CacheStatus {
    directory: String,
    snapshots: usize,
    total_bytes: u64,
    oldest_age_hours: Option<f64>,
}

pub fn execute(cli: &Cli, config: &TelecastConfig, command: &CacheCommands) -> Result<()> {
    let dir = cli.cache_dir_path(config);
    match command {
        CacheCommands::Status => status(cli, &dir),
        CacheCommands::Purge(args) => purge(&dir, args),
    }
}

fn snapshot_files(dir: &std::path::Path) -> Result<Vec<fs::DirEntry>> {
    let mut files = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let entry = entry?;
        if entry.path().extension().map(|ext| ext == "gz").unwrap_or(false) {
            files.push(entry);
        }
    }
    Ok(files)
}

fn status(cli: &Cli, dir: &std::path::Path) -> Result<()> {
    let files = snapshot_files(dir)?;
    let mut total_bytes = 0u64;
    let mut oldest: Option<Duration> = None;
    let now = SystemTime::now();
    for entry in &files {
        let meta = entry.metadata()?;
        total_bytes += meta.len();
        if let Ok(modified) = meta.modified() {
            if let Ok(age) = now.duration_since(modified) {
                oldest = Some(oldest.map_or(age, |current| current.max(age)));
            }
        }
    }
    let report = CacheStatus {
        directory: dir.display().to_string(),
        snapshots: files.len(),
        total_bytes,
        oldest_age_hours: oldest.map(|age| age.as_secs_f64() / 3600.0),
    };
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "{}: {} snapshots, {} bytes{}",
            report.directory,
            report.snapshots,
            report.total_bytes,
            report
                .oldest_age_hours
                .map(|hours| format!(", oldest {hours:.1}h"))
                .unwrap_or_default()
        ),
    }
    Ok(())
}

fn purge(dir: &std::path::Path, args: &CachePurgeArgs) -> Result<()> {
    let cutoff = args
        .older_than_hours
        .map(|hours| Duration::from_secs(hours * 3600));
    let now = SystemTime::now();
    let mut removed = 0usize;
    for entry in snapshot_files(dir)? {
        if let Some(cutoff) = cutoff {
            let age = entry
                .metadata()?
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if !age.map(|age| age >= cutoff).unwrap_or(false) {
                continue;
            }
        }
        fs::remove_file(entry.path())?;
        removed += 1;
    }
    println!("purged {removed} snapshots");
    Ok(())
}
