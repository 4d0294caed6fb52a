//! mindmap CLI tool
//!
//! Renders a JSON array of parent-referencing records as a collapsible tree using mindmap-core.
//!
//! ## Commands
//!
//! - `show <records.json>`: build the tree once and print the visible rows
//! - `init [path]`: write a default `mindmap.toml`
//!
//! Rows are printed with a marker: `[-]` expanded, `[+]` collapsed with hidden children, ` - `
//! leaf. Search matches are suffixed with `*`.

use clap::{Parser, Subcommand};
use mindmap_core::{
    config::{ConfigProvider, DefaultDepth, MindmapConfig, TomlConfigProvider},
    engine::{LoadParams, SyncEngine},
    properties::RecordId,
    query::Filter,
    store::RecordStore,
    MindmapError,
};
use std::path::PathBuf;

const DEFAULT_MODEL: &str = "mindmap.node";

#[derive(Parser)]
#[command(name = "mindmap")]
#[command(author, version, about = "Render parent-referencing records as a collapsible tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory where `mindmap.toml` should be created (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Entity type recorded in the configuration
        #[arg(long)]
        model: Option<String>,
    },

    /// Build the tree from a record file and print the visible rows
    Show {
        /// JSON array of record objects, each with an `id`
        records: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Default expansion depth: an integer, `root`, or `all`
        #[arg(short, long)]
        depth: Option<String>,

        /// Case-insensitive regex matched against node names
        #[arg(short, long)]
        search: Option<String>,

        /// Additional node ids to expand after loading
        #[arg(short, long, num_args = 1..)]
        expand: Vec<i64>,

        /// Print node ids and colors alongside names
        #[arg(short, long)]
        verbose: bool,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<MindmapConfig, MindmapError> {
    let mut config = match path {
        Some(path) => TomlConfigProvider::new(path).get_config()?,
        None => MindmapConfig::default(),
    };
    if config.model.is_empty() {
        config.model = DEFAULT_MODEL.to_string();
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path, model } => {
            let mut config = MindmapConfig::default();
            config.model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let full_path = path.join("mindmap.toml");
            TomlConfigProvider::new(full_path.clone()).set_config(&config)?;
            println!("Configuration written: {}", full_path.display());
            Ok(())
        }

        Commands::Show {
            records,
            config,
            depth,
            search,
            expand,
            verbose,
        } => {
            let mut config = load_config(config)?;
            if let Some(depth) = depth {
                config.default_depth = DefaultDepth::parse(&depth);
            }
            let store = RecordStore::from_json_file(&config.model, &records)?;
            let name_field = config.name_field.clone();
            let color_field = config.color_field.clone();
            let engine = SyncEngine::new(store, config)?;

            let params = match search.as_deref() {
                Some(text) if !text.is_empty() => {
                    LoadParams::filtered(Filter::name_matches(&name_field, text)?)
                }
                _ => LoadParams::default(),
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(engine.load(params))?;

            for id in expand {
                engine.expand(RecordId(id));
            }

            let graph = engine.graph();
            if verbose {
                println!(
                    "{} nodes, {} roots, {} highlighted ({})",
                    graph.len(),
                    graph.roots().len(),
                    engine.highlights().len(),
                    records.display()
                );
            }
            for row in engine.visible_rows() {
                let Some(node) = graph.get(row.id) else {
                    continue;
                };
                let marker = match (node.has_children(), engine.is_expanded(row.id)) {
                    (false, _) => " - ",
                    (true, true) => "[-]",
                    (true, false) => "[+]",
                };
                let highlight = if engine.is_highlighted(row.id) { " *" } else { "" };
                let indent = "    ".repeat(row.depth - 1);
                if verbose {
                    println!(
                        "{indent}{marker} {}{highlight}  (#{}, {} {})",
                        node.name(&name_field),
                        node.id,
                        color_field,
                        node.color
                    );
                } else {
                    println!("{indent}{marker} {}{highlight}", node.name(&name_field));
                }
            }
            Ok(())
        }
    }
}
