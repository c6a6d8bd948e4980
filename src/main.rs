//! # Graph Directory CLI (`gdir`)
//!
//! ## Usage
//!
//! ```bash
//! gdir --config ./config/gdir.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gdir page` | Print one page of the directory, optionally searched or filtered |
//! | `gdir facets` | Print the distinct values of the filter attributes |
//! | `gdir serve` | Start the directory HTTP server |
//! | `gdir demo` | Like `page`, against a generated in-memory directory |
//!
//! Logs go to stderr and are controlled by `RUST_LOG` (default `info`).

use clap::{Args, Parser, Subcommand};
use graph_directory::browse::{self, PageQuery};
use graph_directory::config::{self, Config};
use graph_directory::demo::demo_source;
use graph_directory::graph::GraphClient;
use graph_directory::server;
use graph_directory_core::{Directory, PageSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Graph Directory CLI: browse a Microsoft Graph user directory with
/// search, filters and previous/next paging.
///
/// Commands that talk to Graph read a bearer token from the variable
/// named by `graph.token_env` (default `GRAPH_ACCESS_TOKEN`).
#[derive(Parser)]
#[command(name = "gdir", version, about = "Graph Directory: page, search and filter a user directory")]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/gdir.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of the directory.
    ///
    /// Pages past the first are reached by following next links from
    /// page 1, exactly as a user clicking "next" would.
    Page(QueryArgs),

    /// Print the distinct values of the filter attributes.
    ///
    /// Each attribute costs one full traversal of the directory.
    Facets {
        /// Only this attribute (`jobTitle`, `department`, `officeLocation`).
        #[arg(long)]
        attribute: Option<String>,
    },

    /// Start the directory HTTP server on `[server].bind`.
    Serve {
        /// Serve a generated in-memory directory instead of Graph.
        #[arg(long)]
        demo: bool,

        /// Number of generated users with `--demo`.
        #[arg(long, default_value_t = 200)]
        size: usize,
    },

    /// Run `page` against a generated in-memory directory (no network).
    Demo {
        #[command(flatten)]
        query: QueryArgs,

        /// Number of generated users.
        #[arg(long, default_value_t = 200)]
        size: usize,
    },
}

/// Query flags shared by `page` and `demo`.
#[derive(Args)]
struct QueryArgs {
    /// Name search: every word must prefix the given name or surname.
    #[arg(long, conflicts_with = "filter")]
    search: Option<String>,

    /// Equality filter as `attribute=value`; repeat for several attributes.
    #[arg(long = "filter", value_parser = parse_key_val)]
    filter: Vec<(String, String)>,

    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    page: usize,
}

impl From<QueryArgs> for PageQuery {
    fn from(args: QueryArgs) -> Self {
        PageQuery {
            search: args.search,
            filters: args.filter,
            page: args.page,
        }
    }
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid ATTRIBUTE=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn directory_for(cfg: &Config, source: Arc<dyn PageSource>) -> Directory<dyn PageSource> {
    Directory::new(
        source,
        cfg.directory.query_builder(),
        cfg.directory.facet_options(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Page(args) => {
            let client = GraphClient::from_config(&cfg.graph)?;
            browse::run_page(&cfg, client, &args.into()).await?;
        }
        Commands::Facets { attribute } => {
            let client = GraphClient::from_config(&cfg.graph)?;
            browse::run_facets(&cfg, client, attribute.as_deref()).await?;
        }
        Commands::Serve { demo, size } => {
            let source: Arc<dyn PageSource> = if demo {
                Arc::new(demo_source(size))
            } else {
                Arc::new(GraphClient::from_config(&cfg.graph)?)
            };
            server::run_server(&cfg, directory_for(&cfg, source)).await?;
        }
        Commands::Demo { query, size } => {
            browse::run_page(&cfg, demo_source(size), &query.into()).await?;
        }
    }

    Ok(())
}
