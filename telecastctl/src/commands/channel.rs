use std::fs;

use serde::Serialize;
use telecast_core::{Channel, SqliteChannelStore};
use uuid::Uuid;

use crate::{
    AppError, ChannelCommands, ChannelCreateArgs, ChannelShowArgs, Cli, OutputFormat, Result,
};

#[derive(Debug, Serialize)]
struct ChannelSummary {
    id: String,
    name: String,
    library_key: String,
    items: usize,
    loop_minutes: f64,
    shuffle: bool,
}

impl ChannelSummary {
    fn from_channel(channel: &Channel) -> Self {
        Self {
            id: channel.id.to_string(),
            name: channel.name.clone(),
            library_key: channel.library_key.clone(),
            items: channel.items.len(),
            loop_minutes: channel.total_duration_s() / 60.0,
            shuffle: channel.options.shuffle,
        }
    }
}

pub fn execute(cli: &Cli, command: &ChannelCommands) -> Result<()> {
    let store = open_store(cli)?;
    match command {
        ChannelCommands::List => list(cli, &store),
        ChannelCommands::Show(args) => show(cli, &store, args),
        ChannelCommands::Create(args) => create(&store, args),
        ChannelCommands::Delete(args) => delete(&store, args),
    }
}

pub fn open_store(cli: &Cli) -> Result<SqliteChannelStore> {
    let path = cli.channels_db_path();
    let store = SqliteChannelStore::builder()
        .path(&path)
        .create_if_missing(true)
        .build()?;
    store.initialize()?;
    Ok(store)
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::InvalidArgument(format!("not a channel id: {raw}")))
}

pub fn load_channel(store: &SqliteChannelStore, raw_id: &str) -> Result<Channel> {
    let id = parse_id(raw_id)?;
    store
        .fetch_by_id(id)?
        .ok_or_else(|| AppError::MissingResource(format!("channel {raw_id}")))
}

fn list(cli: &Cli, store: &SqliteChannelStore) -> Result<()> {
    let channels = store.list()?;
    let summaries: Vec<ChannelSummary> = channels.iter().map(ChannelSummary::from_channel).collect();
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("no channels stored");
            }
            for summary in &summaries {
                println!(
                    "{}  {}  items={}  loop={:.1}m{}",
                    summary.id,
                    summary.name,
                    summary.items,
                    summary.loop_minutes,
                    if summary.shuffle { "  shuffle" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn show(_cli: &Cli, store: &SqliteChannelStore, args: &ChannelShowArgs) -> Result<()> {
    // The serialized shape is the output either way.
    let channel = load_channel(store, &args.id)?;
    println!("{}", serde_json::to_string_pretty(&channel)?);
    Ok(())
}

fn create(store: &SqliteChannelStore, args: &ChannelCreateArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.file)?;
    let channel: Channel = serde_json::from_str(&raw)?;
    store.upsert(&channel)?;
    println!("stored {} ({})", channel.name, channel.id);
    Ok(())
}

fn delete(store: &SqliteChannelStore, args: &ChannelShowArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    store.delete(id)?;
    println!("deleted {id}");
    Ok(())
}
