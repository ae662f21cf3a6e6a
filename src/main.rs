use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use packument_resolver::config::ResolveConfig;
use packument_resolver::resolver::Resolver;
use packument_resolver::version::cutoff::parse_instant;

mod logging;

#[derive(Parser, Debug)]
#[command(name = "packument-resolver")]
#[command(version, about = "Resolve an npm package specifier to a concrete manifest")]
struct Cli {
    /// Package name, e.g. `lodash` or `@types/node`
    name: String,

    /// Version, range or dist-tag; empty means the default tag
    #[arg(default_value = "")]
    spec: String,

    /// Registry base URL
    #[arg(long)]
    registry: Option<String>,

    /// Request full packuments instead of abbreviated ones
    #[arg(long)]
    full_metadata: bool,

    #[arg(long)]
    default_tag: Option<String>,

    /// Only consider releases published before this instant (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_before)]
    before: Option<DateTime<Utc>>,

    #[arg(long)]
    node_version: Option<String>,

    #[arg(long)]
    npm_version: Option<String>,

    #[arg(long)]
    include_staged: bool,

    /// Range of versions to deprioritize
    #[arg(long)]
    avoid: Option<String>,

    /// Retry failed fetches this many times with exponential backoff
    #[arg(long)]
    retries: Option<u32>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the whole packument instead of the chosen manifest
    #[arg(long)]
    packument: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Overlay command-line flags on top of `config`
    fn apply(&self, config: &mut ResolveConfig) {
        if let Some(url) = &self.registry {
            config.registry.url = url.clone();
        }
        if self.full_metadata {
            config.registry.full_metadata = true;
        }
        if let Some(retries) = self.retries {
            config.registry.retry.max_attempts = retries;
        }

        let pick = &mut config.pick;
        if let Some(tag) = &self.default_tag {
            pick.default_tag = tag.clone();
        }
        if self.before.is_some() {
            pick.before = self.before;
        }
        if self.node_version.is_some() {
            pick.node_version = self.node_version.clone();
        }
        if self.npm_version.is_some() {
            pick.npm_version = self.npm_version.clone();
        }
        if self.include_staged {
            pick.include_staged = true;
        }
        if self.avoid.is_some() {
            pick.avoid = self.avoid.clone();
        }
    }
}

fn parse_before(input: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(input).ok_or_else(|| format!("invalid date: {input}"))
}

fn load_config(cli: &Cli) -> Result<ResolveConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => ResolveConfig::default(),
    };
    cli.apply(&mut config);
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let resolver = Resolver::from_config(&config.registry)?;

    let output = if cli.packument {
        let packument = resolver.packument(&cli.name).await?;
        serde_json::to_string_pretty(packument.as_ref())?
    } else {
        let manifest = resolver.resolve(&cli.name, &cli.spec, &config.pick).await?;
        serde_json::to_string_pretty(&manifest)?
    };

    println!("{output}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_json);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
