//! Command-line interface for cockpit-graph.
//!
//! Provides commands for checking the CMS connection, running a sync
//! into a JSON node graph, and showing the resolved configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::CockpitClient;
use crate::config::{self, ResolvedConfig};
use crate::content::SourceKind;
use crate::core::{SyncRunner, SyncSummary};
use crate::graph::Graph;

/// cockpit-graph - Cockpit CMS content to linked node graph
#[derive(Parser, Debug)]
#[command(name = "cockpit-graph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: .cockpit/config.yaml, then ~/.config/cockpit-graph/config.yaml)
    #[arg(short, long, global = true, env = "COCKPIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify the CMS is reachable and accepts the token
    Check,

    /// Fetch, normalize and link all configured content
    Sync {
        /// Write the node graph as JSON to this file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            Commands::Check => check(config_path).await,
            Commands::Sync { output } => sync(config_path, output).await,
            Commands::Config => show_config(config_path),
        }
    }
}

fn runner(config: ResolvedConfig) -> Result<SyncRunner> {
    let client = CockpitClient::new(&config.base_url, &config.token, config.request_timeout)?;
    Ok(SyncRunner::new(config, Arc::new(client)))
}

async fn check(config_path: Option<&Path>) -> Result<()> {
    let runner = runner(config::load_config(config_path)?)?;
    runner.check().await?;
    eprintln!("CMS at {} is reachable", runner.config().base_url);
    Ok(())
}

async fn sync(config_path: Option<&Path>, output: Option<PathBuf>) -> Result<()> {
    let runner = runner(config::load_config(config_path)?)?;

    let mut graph = Graph::new();
    let summary = runner.run(&mut graph).await?;

    let json = serde_json::to_string_pretty(&graph).context("Failed to serialize node graph")?;
    match output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("Failed to write graph: {}", path.display()))?,
        None => println!("{}", json),
    }

    print_summary(&summary, graph.len());
    Ok(())
}

fn print_summary(summary: &SyncSummary, nodes: usize) {
    eprintln!("\n[Sync {} completed]", summary.run_id);
    eprintln!("  Forests:        {}", summary.forests);
    eprintln!("  Items:          {}", summary.items);
    eprintln!("  Nodes:          {}", nodes);
    eprintln!(
        "  Resources:      {} images, {} assets, {} markdowns, {} layouts",
        summary.resources.images,
        summary.resources.assets,
        summary.resources.markdowns,
        summary.resources.layouts
    );
    eprintln!("  Linked fields:  {}", summary.linked_fields);
    if summary.missing_media > 0 {
        eprintln!("  Missing media:  {}", summary.missing_media);
    }
    for failure in &summary.failed_sources {
        eprintln!("  Skipped: {}", failure);
    }
}

/// Show the resolved configuration (for debugging)
fn show_config(config_path: Option<&Path>) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using environment)".to_string()));
    println!();
    println!("CMS:");
    println!("  Base URL: {}", cfg.base_url);
    println!("  Token:    {}", cfg.masked_token());
    println!("  Timeout:  {}s", cfg.request_timeout.as_secs());
    println!();
    println!("Collections:");
    if cfg.collections.is_empty() {
        println!("  (none)");
    }
    for name in &cfg.collections {
        println!("  {} -> {}", name, cfg.published_name(SourceKind::Collection, name));
    }
    println!();
    println!("Trees:");
    if cfg.trees.is_empty() {
        println!("  (none)");
    }
    for name in &cfg.trees {
        println!("  {} -> {}", name, cfg.published_name(SourceKind::Tree, name));
    }
    println!();
    let locales: Vec<&str> = cfg.locales.iter().map(|l| l.as_str()).collect();
    println!("Locales:        {}", if locales.is_empty() { "any".to_string() } else { locales.join(", ") });
    println!("On fetch error: {:?}", cfg.on_fetch_error);

    Ok(())
}
