use chrono::Utc;
use clap::Parser;
use telecast_core::{Channel, ChannelOptions, MediaItem, MediaKind};
use telecastctl::commands::channel::{load_channel, open_store, parse_id};
use telecastctl::{AppError, Cli};

fn cli_with_db(db: &std::path::Path) -> Cli {
    Cli::parse_from([
        "telecastctl",
        "--channels-db",
        db.to_str().unwrap(),
        "channel",
        "list",
    ])
}

#[test]
fn store_round_trip_through_cli_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_with_db(&dir.path().join("channels.sqlite"));
    let store = open_store(&cli).unwrap();

    let channel = Channel::new(
        "Morning Cartoons",
        "lib-kids",
        MediaKind::Movie,
        Utc::now(),
        vec![MediaItem::new("m1", "Short", 420.0)],
        ChannelOptions { shuffle: true },
    );
    store.upsert(&channel).unwrap();

    let loaded = load_channel(&store, &channel.id.to_string()).unwrap();
    assert_eq!(loaded.name, "Morning Cartoons");
    assert!(loaded.options.shuffle);
}

#[test]
fn bad_ids_and_missing_channels_report_distinct_errors() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_with_db(&dir.path().join("channels.sqlite"));
    let store = open_store(&cli).unwrap();

    assert!(matches!(
        parse_id("not-a-uuid"),
        Err(AppError::InvalidArgument(_))
    ));
    let absent = uuid::Uuid::new_v4();
    assert!(matches!(
        load_channel(&store, &absent.to_string()),
        Err(AppError::MissingResource(_))
    ));
}
