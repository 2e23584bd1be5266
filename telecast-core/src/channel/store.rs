use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::sqlite::configure_connection;

use super::models::{Channel, ChannelOptions, MediaItem, MediaKind};

const CHANNEL_SCHEMA: &str = include_str!("../../sql/channels.sql");

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open channel database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("failed to execute statement on channel database: {0}")]
    Execute(#[from] rusqlite::Error),
    #[error("channel store path not configured")]
    MissingStore,
    #[error("channel not found: {0}")]
    NotFound(Uuid),
    #[error("invalid channel row: {0}")]
    InvalidRow(String),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Clone)]
pub struct SqliteChannelStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteChannelStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteChannelStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> ChannelResult<SqliteChannelStore> {
        let path = self.path.ok_or(ChannelError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteChannelStore { path, flags })
    }
}

/// Persists the serialized channel shape. Items, source libraries, and
/// options live in JSON columns so the row round-trips the wire format.
#[derive(Debug, Clone)]
pub struct SqliteChannelStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteChannelStore {
    pub fn builder() -> SqliteChannelStoreBuilder {
        SqliteChannelStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> ChannelResult<Self> {
        SqliteChannelStoreBuilder::new().path(path).build()
    }

    fn open(&self) -> ChannelResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            ChannelError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| ChannelError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> ChannelResult<()> {
        let conn = self.open()?;
        conn.execute_batch(CHANNEL_SCHEMA)?;
        Ok(())
    }

    pub fn upsert(&self, channel: &Channel) -> ChannelResult<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO channels (id, name, library_key, library_type, created_at, \
             schedule_anchor, items, source_libraries, options, provenance, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, \
             library_key = excluded.library_key, \
             library_type = excluded.library_type, \
             schedule_anchor = excluded.schedule_anchor, \
             items = excluded.items, \
             source_libraries = excluded.source_libraries, \
             options = excluded.options, \
             provenance = excluded.provenance, \
             updated_at = excluded.updated_at",
            params![
                channel.id.to_string(),
                channel.name,
                channel.library_key,
                channel.library_type.as_str(),
                channel.created_at,
                channel.schedule_anchor,
                serde_json::to_string(&channel.items)?,
                serde_json::to_string(&channel.source_libraries)?,
                serde_json::to_string(&channel.options)?,
                channel.provenance,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    pub fn fetch_by_id(&self, id: Uuid) -> ChannelResult<Option<Channel>> {
        let conn = self.open()?;
        let channel = conn
            .query_row(
                "SELECT id, name, library_key, library_type, created_at, schedule_anchor, \
                 items, source_libraries, options, provenance \
                 FROM channels WHERE id = ?1",
                params![id.to_string()],
                channel_from_row,
            )
            .optional()?;
        channel.transpose()
    }

    pub fn list(&self) -> ChannelResult<Vec<Channel>> {
        let conn = self.open()?;
        let mut statement = conn.prepare(
            "SELECT id, name, library_key, library_type, created_at, schedule_anchor, \
             items, source_libraries, options, provenance \
             FROM channels ORDER BY name",
        )?;
        let rows = statement.query_map([], channel_from_row)?;
        let mut channels = Vec::new();
        for row in rows {
            channels.push(row??);
        }
        Ok(channels)
    }

    pub fn delete(&self, id: Uuid) -> ChannelResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("DELETE FROM channels WHERE id = ?1", params![id.to_string()])?;
        if affected == 0 {
            return Err(ChannelError::NotFound(id));
        }
        Ok(())
    }
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelResult<Channel>> {
    let id: String = row.get("id")?;
    let name: String = row.get("name")?;
    let library_key: String = row.get("library_key")?;
    let library_type: String = row.get("library_type")?;
    let created_at: DateTime<Utc> = row.get("created_at")?;
    let schedule_anchor: DateTime<Utc> = row.get("schedule_anchor")?;
    let items: String = row.get("items")?;
    let source_libraries: String = row.get("source_libraries")?;
    let options: String = row.get("options")?;
    let provenance: Option<String> = row.get("provenance")?;
    Ok(decode_channel(
        id,
        name,
        library_key,
        library_type,
        created_at,
        schedule_anchor,
        items,
        source_libraries,
        options,
        provenance,
    ))
}

#[allow(clippy::too_many_arguments)]
fn decode_channel(
    id: String,
    name: String,
    library_key: String,
    library_type: String,
    created_at: DateTime<Utc>,
    schedule_anchor: DateTime<Utc>,
    items: String,
    source_libraries: String,
    options: String,
    provenance: Option<String>,
) -> ChannelResult<Channel> {
    let id = Uuid::parse_str(&id).map_err(|err| ChannelError::InvalidRow(err.to_string()))?;
    let library_type =
        MediaKind::from_str(&library_type).map_err(ChannelError::InvalidRow)?;
    let items: Vec<MediaItem> = serde_json::from_str(&items)?;
    let source_libraries: Vec<String> = serde_json::from_str(&source_libraries)?;
    let options: ChannelOptions = serde_json::from_str(&options)?;
    Ok(Channel {
        id,
        name,
        library_key,
        library_type,
        created_at,
        schedule_anchor,
        items,
        source_libraries,
        options,
        provenance,
    })
}
