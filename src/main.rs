use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mock_harvest::config::Config;
use mock_harvest::endpoint::{Catalog, EndpointAdapter, HttpClient, SubOperation};
use mock_harvest::harvest::HarvestSession;
use mock_harvest::recorder::{fixture_name, MockRecorder};
use mock_harvest::{hlog, hlog_error, Result};

/// make-mocks - record API responses as JSON fixtures
#[derive(Parser, Debug)]
#[command(name = "make-mocks")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    MOCKS_LOGIN, MOCKS_PASSWORD   API credentials\n    MOCKS_API_URL                 API base url\n    MOCKS_DEBUG=1                 Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Configuration file (default: ~/.mock-harvest/config.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (writes to ~/.mock-harvest/make-mocks.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Call every endpoint and record the responses
    Run {
        /// Directory receiving the fixtures
        #[arg(long)]
        mocks_dir: Option<PathBuf>,

        /// Descriptor catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// List the fixture file name of every catalog entry
    Fixtures {
        /// Descriptor catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Validate the catalog and the task graph without calling the API
    Check {
        /// Descriptor catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    mock_harvest::log::init(cli.debug);
    if cli.debug {
        hlog!("make-mocks starting (debug mode enabled)");
    } else {
        hlog!("make-mocks starting");
    }

    if let Err(e) = dispatch(cli) {
        hlog_error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Run { mocks_dir, catalog } => run_harvest(config, mocks_dir, catalog),
        Command::Fixtures { catalog } => run_fixtures(&config, catalog.as_deref()),
        Command::Check { catalog } => run_check(config, catalog),
    }
}

fn load_catalog(config: &Config, catalog: Option<&Path>) -> Result<Catalog> {
    let path = catalog.map(Path::to_path_buf).unwrap_or_else(|| config.catalog_path());
    Catalog::load(&path)
}

/// Harvest fixtures from the live API.
fn run_harvest(config: Config, mocks_dir: Option<PathBuf>, catalog: Option<PathBuf>) -> Result<()> {
    let catalog = load_catalog(&config, catalog.as_deref())?;
    let (login, password) = config.credentials()?;
    let mocks_dir = mocks_dir.unwrap_or_else(|| config.mocks_dir());
    hlog!(
        "Run command: api_url={}, mocks_dir={}",
        config.api_url,
        mocks_dir.display()
    );

    let client = HttpClient::new(&config.api_url, &login, &password);
    let adapter = EndpointAdapter::new(Arc::new(catalog), Arc::new(client));
    let session = HarvestSession::new(adapter, MockRecorder::new(mocks_dir), &config);

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(session.run())?;

    for path in &summary.fixtures {
        println!("{}", path.display());
    }
    println!(
        "{} fixtures written, {} operations completed, cleaned up: {}",
        summary.fixtures.len(),
        summary.operations_completed,
        summary.cleaned.join(", ")
    );
    Ok(())
}

/// Print the fixture name of every descriptor, sub-operations included.
fn run_fixtures(config: &Config, catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config, catalog)?;
    for (op, descriptor) in catalog.entries() {
        println!("{:<28} {}", op.as_str(), fixture_name(descriptor));
        for sub in SubOperation::ALL {
            if let Some(nested) = descriptor.sub(sub) {
                println!("{:<28} {}", format!("{}.{}", op, sub), fixture_name(nested));
            }
        }
    }
    Ok(())
}

/// Resolve every operation and build the task graph, offline.
fn run_check(config: Config, catalog: Option<PathBuf>) -> Result<()> {
    let catalog = load_catalog(&config, catalog.as_deref())?;
    // Never called: validation does not touch the network.
    let client = HttpClient::new(&config.api_url, "", "");
    let adapter = EndpointAdapter::new(Arc::new(catalog), Arc::new(client));
    let session = HarvestSession::new(adapter, MockRecorder::new(config.mocks_dir()), &config);

    let graph = session.validate()?;
    for name in graph.topological_order() {
        println!("{:<28} <- {}", name, graph.dependencies_of(name).join(", "));
    }
    println!(
        "OK: {} tasks, {} dependencies",
        graph.task_count(),
        graph.dependency_count()
    );
    Ok(())
}
