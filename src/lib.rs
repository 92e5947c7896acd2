pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod schema;
pub mod search;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use client::{CommitOptions, SearchBackend, SearchClient};
use config::ClientConfig;
use search::{FilterExpr, SelectRequest, SelectResponse};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "solr-sync",
    version,
    about = "Maintenance and query commands against a Solr index"
)]
pub struct Cli {
    /// TOML config file; SOLR_SYNC_* environment variables override it
    #[arg(long, env = "SOLR_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the engine answers
    Ping,
    /// Make pending writes visible
    Commit {
        /// Return before the index is flushed to disk
        #[arg(long)]
        no_wait: bool,
    },
    /// Merge index segments (slow)
    Optimize {
        #[arg(long)]
        no_wait: bool,
    },
    /// Delete every document matching a query
    DeleteAll {
        /// Lucene query; everything when omitted
        #[arg(long)]
        query: Option<String>,
    },
    /// Run a select and print the ids found
    Select {
        /// Lucene query
        #[arg(default_value = search::MATCH_ALL)]
        query: String,

        #[arg(long, default_value_t = 10)]
        rows: usize,

        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Extra filter queries
        #[arg(long = "fq")]
        filters: Vec<String>,

        /// Print the raw response body instead
        #[arg(long)]
        raw: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref())?;
    let client = SearchClient::new(config.clone())
        .with_context(|| format!("creating client for {}", config.base_url()))?;

    match cli.command {
        Commands::Ping => {
            if client.responds() {
                println!("{} is up", config.base_url());
                Ok(())
            } else {
                anyhow::bail!("{} is not responding", config.base_url())
            }
        }
        Commands::Commit { no_wait } => Ok(client.commit(wait_options(no_wait))?),
        Commands::Optimize { no_wait } => Ok(client.optimize(wait_options(no_wait))?),
        Commands::DeleteAll { query } => Ok(client.delete_all(query.as_deref())?),
        Commands::Select {
            query,
            rows,
            start,
            filters,
            raw,
        } => run_select(&client, &query, rows, start, filters, raw),
    }
}

fn wait_options(no_wait: bool) -> CommitOptions {
    CommitOptions {
        wait_flush: !no_wait,
        wait_searcher: !no_wait,
    }
}

fn run_select(
    client: &SearchClient,
    query: &str,
    rows: usize,
    start: usize,
    filters: Vec<String>,
    raw: bool,
) -> Result<()> {
    let q = FilterExpr::from(query).compile()?;
    let mut request = SelectRequest::new();
    request
        .set("q", q)
        .set("start", start)
        .set("rows", rows)
        .set("wt", "json")
        .set("fl", "solr_id,score");
    if !filters.is_empty() {
        request.set("fq", filters);
    }

    let body = client.select(&request)?;
    if raw {
        println!("{body}");
        return Ok(());
    }
    let response = SelectResponse::parse(&body)?;
    for id in response.ids() {
        println!("{id}");
    }
    eprintln!("{} found", response.num_found());
    Ok(())
}
