//! CLI Tooling
//!
//! `share` drives a live tree against a [`LocalTransferSession`] until every
//! resolution settles and reports the resulting share states. `list` and
//! `collections` are read-only views.

use crate::collection::{CollectionStore, Manifest};
use crate::config::{ConfigLoader, ShareTreeConfig};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::session::LocalTransferSession;
use crate::tree::{Node, ShareTree};
use crate::types::NodeId;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Sharetree CLI - share local files and directories as content-addressed transfers
#[derive(Parser, Debug)]
#[command(name = "sharetree")]
#[command(about = "Share local files and directories as content-addressed transfers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path, layered over the global config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Filesystem root to mirror (repeatable; replaces configured roots)
    #[arg(long = "root")]
    pub roots: Vec<PathBuf>,

    /// Directory collection manifests are written to
    #[arg(long)]
    pub collection_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Share files or directories and wait for their transfers
    Share {
        /// Paths to share
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Also share every nested directory
        #[arg(long, short)]
        recursive: bool,
        /// Seconds to wait for content resolution
        #[arg(long, default_value = "60")]
        timeout: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List a directory's children with their share state
    List {
        path: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List manifests in the collection directory
    Collections {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// One reported node
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    pub path: String,
    pub kind: &'static str,
    pub state: &'static str,
    pub size: u64,
    pub identity: Option<String>,
    pub collection: Option<String>,
    pub error: Option<String>,
}

/// One manifest in the collection directory
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRow {
    pub file: String,
    pub entries: usize,
    pub bytes: u64,
}

/// CLI context holding the effective configuration
pub struct CliContext {
    config: ShareTreeConfig,
}

impl CliContext {
    /// Load configuration and apply command-line overrides.
    pub fn new(
        config_path: Option<PathBuf>,
        roots: Vec<PathBuf>,
        collection_dir: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        let mut config = match &config_path {
            Some(path) => ConfigLoader::load_with_file(path)?,
            None => ConfigLoader::load()?,
        };
        if !roots.is_empty() {
            config.roots = roots
                .iter()
                .map(|root| std::path::absolute(root))
                .collect::<Result<_, _>>()?;
        }
        if collection_dir.is_some() {
            config.collection_dir = collection_dir;
        }
        Self::from_config(config)
    }

    pub fn from_config(config: ShareTreeConfig) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ShareTreeConfig {
        &self.config
    }

    /// Logging configuration with command-line flags applied.
    pub fn logging_config(&self, cli: &Cli) -> LoggingConfig {
        let mut logging = self.config.logging.clone();
        if cli.verbose {
            logging.level = "debug".to_string();
            logging.output = "stderr".to_string();
        }
        if let Some(level) = &cli.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &cli.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Share {
                paths,
                recursive,
                timeout,
                format,
            } => self.share(paths, *recursive, Duration::from_secs(*timeout), format),
            Commands::List { path, format } => self.list(path, format),
            Commands::Collections { format } => self.collections(format),
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }

    fn share(
        &self,
        paths: &[PathBuf],
        recursive: bool,
        timeout: Duration,
        format: &str,
    ) -> Result<String, ApiError> {
        let (events_tx, events) = mpsc::channel();
        let session = Arc::new(LocalTransferSession::new(&self.config.hashing, events_tx)?);
        let mut tree = ShareTree::new(
            self.config.roots.clone(),
            self.config.resolve_collection_dir()?,
            session,
        );

        let started = Instant::now();
        let shared = paths
            .iter()
            .map(|path| tree.share_path(path, recursive))
            .collect::<Result<Vec<_>, _>>()?;
        if tree.run_until_settled(&events, timeout) {
            info!(
                paths = paths.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Share settled"
            );
        } else {
            warn!(in_flight = tree.in_flight(), "Share did not settle before timeout");
        }

        let mut rows = Vec::new();
        for id in shared {
            collect_rows(&tree, id, recursive, &mut rows);
        }
        format_node_rows(&rows, format)
    }

    fn list(&self, path: &std::path::Path, format: &str) -> Result<String, ApiError> {
        let (events_tx, _events) = mpsc::channel();
        let session = Arc::new(LocalTransferSession::new(&self.config.hashing, events_tx)?);
        let mut tree = ShareTree::new(
            self.config.roots.clone(),
            self.config.resolve_collection_dir()?,
            session,
        );
        let id = tree.node_for_path(path)?;
        tree.populate(id)?;

        let rows: Vec<_> = tree
            .children(id)
            .into_iter()
            .filter_map(|child| node_row(&tree, child))
            .collect();
        format_node_rows(&rows, format)
    }

    fn collections(&self, format: &str) -> Result<String, ApiError> {
        let store = CollectionStore::new(self.config.resolve_collection_dir()?);
        let rows = store
            .list()
            .into_iter()
            .map(|path| -> Result<CollectionRow, ApiError> {
                let manifest = Manifest::read(&path)?;
                Ok(CollectionRow {
                    file: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    entries: manifest.len(),
                    bytes: manifest.entries.iter().map(|e| e.size).sum(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if format == "json" {
            return to_json(&rows);
        }
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["Manifest", "Entries", "Bytes"]);
        for row in &rows {
            table.add_row(vec![
                row.file.clone(),
                row.entries.to_string(),
                row.bytes.to_string(),
            ]);
        }
        Ok(format!("{}\n{}", store.dir().display(), table))
    }
}

/// A node's row, then its children's; nested directories only when recursive.
fn collect_rows(tree: &ShareTree, id: NodeId, recursive: bool, rows: &mut Vec<NodeRow>) {
    let Some(row) = node_row(tree, id) else {
        return;
    };
    rows.push(row);
    let Some(dir) = tree.node(id).and_then(Node::as_dir) else {
        return;
    };
    for &file in dir.files() {
        rows.extend(node_row(tree, file));
    }
    for &child in dir.dirs() {
        if recursive {
            collect_rows(tree, child, true, rows);
        } else {
            rows.extend(node_row(tree, child));
        }
    }
}

fn node_row(tree: &ShareTree, id: NodeId) -> Option<NodeRow> {
    let node = tree.node(id)?;
    let collection = node.as_dir().and_then(|dir| dir.collection()).and_then(|c| {
        c.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    Some(NodeRow {
        path: tree.path_of(id)?.display().to_string(),
        kind: if node.is_dir() { "dir" } else { "file" },
        state: node.state().as_str(),
        size: node.size(),
        identity: node.content_identity().map(|id| id.to_hex()),
        collection,
        error: node.last_error().map(|e| e.to_string()),
    })
}

fn format_node_rows(rows: &[NodeRow], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&rows);
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Path", "Kind", "State", "Size", "Identity", "Collection", "Error"]);
    for row in rows {
        table.add_row(vec![
            row.path.clone(),
            row.kind.to_string(),
            row.state.to_string(),
            row.size.to_string(),
            row.identity
                .as_deref()
                .map(short_hex)
                .unwrap_or_else(|| "-".to_string()),
            row.collection.clone().unwrap_or_else(|| "-".to_string()),
            row.error.clone().unwrap_or_default(),
        ]);
    }
    Ok(table.to_string())
}

fn short_hex(hex: &str) -> String {
    hex.chars().take(12).collect()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render JSON: {}", e)))
}
