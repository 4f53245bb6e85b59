//! Administrative entry point for a storage database.
//!
//! # Responsibility
//! - Create record tables for the collections listed in a layout file.
//! - Expose flush, timestamp and tombstone purge for operators.

use clap::{Parser, Subcommand};
use kinto_storage::{
    init_logging, CollectionBinding, CollectionRegistry, ColumnDef, ColumnType, IntegerId,
    LogLevel, RecordStorage, Storage, StorageSettings, TableDef, Timestamp, UuidId,
};
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database file; in-memory when omitted
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON file listing the collections and their columns
    #[arg(long)]
    layout: Option<PathBuf>,

    #[arg(long, default_value_t = 10_000)]
    max_fetch_size: usize,

    /// Absolute directory for rolling log files; no file logging when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing record tables
    Migrate {
        /// Print the statements without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Drop and recreate every table
    Flush,
    /// Print the collection timestamp of one namespace
    Timestamp {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        parent: String,
    },
    /// Remove tombstones of one namespace
    Purge {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        parent: String,
        /// Only tombstones older than this epoch-millisecond timestamp
        #[arg(long)]
        before: Option<i64>,
    },
}

#[derive(Debug, Deserialize)]
struct CollectionLayout {
    collection_id: String,
    table: String,
    #[serde(default)]
    id_kind: IdKind,
    #[serde(default = "default_true")]
    track_timestamps: bool,
    #[serde(default)]
    columns: Vec<ColumnLayout>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IdKind {
    #[default]
    Integer,
    Uuid,
}

#[derive(Debug, Deserialize)]
struct ColumnLayout {
    name: String,
    kind: ColumnType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
}

fn default_true() -> bool {
    true
}

fn load_registry(path: Option<&Path>) -> Result<CollectionRegistry, Box<dyn Error>> {
    let mut registry = CollectionRegistry::new();
    let Some(path) = path else {
        return Ok(registry);
    };
    let layouts: Vec<CollectionLayout> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    for layout in layouts {
        let mut table = TableDef::new(layout.table).track_timestamps(layout.track_timestamps);
        for column in layout.columns {
            let mut def = ColumnDef::new(column.name, column.kind);
            if column.required {
                def = def.required();
            }
            if column.unique {
                def = def.unique();
            }
            table = table.column(def);
        }
        let binding = CollectionBinding::new(layout.collection_id, table);
        let binding = match layout.id_kind {
            IdKind::Integer => binding.with_id_generator(IntegerId),
            IdKind::Uuid => binding.with_id_generator(UuidId),
        };
        registry.register(binding)?;
    }
    Ok(registry)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| LogLevel::build_default().as_str().to_string());
        init_logging(&level, log_dir)?;
    }

    let settings = StorageSettings {
        max_fetch_size: cli.max_fetch_size,
        url: cli.db.clone(),
        ..StorageSettings::default()
    };
    let registry = load_registry(cli.layout.as_deref())?;
    let storage = Storage::open(settings, registry)?;

    match cli.command {
        Command::Migrate { dry_run } => {
            for statement in storage.initialize_schema(dry_run)? {
                println!("{statement}");
            }
        }
        Command::Flush => {
            storage.flush()?;
            println!("flushed {} collections", storage.registry().len());
        }
        Command::Timestamp { collection, parent } => {
            println!("{}", storage.collection_timestamp(&collection, &parent)?);
        }
        Command::Purge {
            collection,
            parent,
            before,
        } => {
            let removed =
                storage.purge_deleted(&collection, &parent, before.map(Timestamp::from_millis))?;
            log::info!(
                "event=purge module=cli status=ok collection={collection} removed={removed}"
            );
            println!("removed {removed} tombstones");
        }
    }

    Ok(())
}
