//! Bibliothek - build catalog CLI
//!
//! The `bibliothek` command records freshly built artifacts as a numbered
//! build of a project version.
//!
//! ## Commands
//!
//! - `insert`: validate artifacts, resolve the hierarchy, number the build,
//!   collect git changes, copy files into storage and write the record
//! - `latest`: show the latest build of a version

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use bibliothek_core::{
    ChangeBoundary, IngestArgs, IngestPipeline, IngestReceipt, IngestRequest, OverwritePolicy,
};
use bibliothek_state::config::DEFAULT_CONFIG_FILE;
use bibliothek_state::{Build, CatalogStore, ConnectionConfig, SurrealCatalogStore};

#[derive(Parser)]
#[command(name = "bibliothek")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Record software builds in the Bibliothek catalog", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Connection settings file (used when SURREALDB_URL is not set)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a build
    Insert(InsertArgs),

    /// Show the latest build of a version
    Latest {
        /// Project name
        #[arg(short, long)]
        project: String,

        /// Version name
        #[arg(short = 'v', long = "version-name")]
        version_name: String,
    },
}

#[derive(clap::Args)]
struct InsertArgs {
    /// Project name. Example: paper
    #[arg(short, long)]
    project: String,

    /// Project display name, stored only on first ingestion. Example: Paper
    #[arg(short = 'n', long)]
    friendly_name: String,

    /// Version group. Example: 1.20
    #[arg(short, long)]
    group: String,

    /// Version name. Example: 1.20.1
    #[arg(short = 'v', long = "version-name")]
    version_name: String,

    /// Build number, or -1 / auto for the next free number
    #[arg(short, long, default_value = "auto", allow_hyphen_values = true)]
    build: String,

    /// Git repository the build was produced from
    #[arg(short, long)]
    repo: PathBuf,

    /// Storage root that receives the artifact files
    #[arg(short, long)]
    storage: PathBuf,

    /// Download as type:path[:hash][:name]; at most one without a name
    #[arg(short, long = "download", required = true)]
    download: Vec<String>,

    /// Release channel: default or experimental
    #[arg(short, long, default_value = "default")]
    channel: String,

    /// Do not repeat the previous build's head commit in the change log
    #[arg(long)]
    exclusive_boundary: bool,

    /// Fail instead of replacing artifact files that already exist
    #[arg(long)]
    no_overwrite: bool,
}

impl InsertArgs {
    fn into_ingest_args(self) -> IngestArgs {
        IngestArgs {
            project: self.project,
            friendly_name: self.friendly_name,
            group: self.group,
            version: self.version_name,
            build: self.build,
            repo: self.repo,
            storage: self.storage,
            channel: self.channel,
            downloads: self.download,
            boundary: if self.exclusive_boundary {
                ChangeBoundary::Exclusive
            } else {
                ChangeBoundary::Inclusive
            },
            overwrite: if self.no_overwrite {
                OverwritePolicy::Reject
            } else {
                OverwritePolicy::Replace
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    bibliothek_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Insert(args) => {
            // Reject bad input before the store is contacted.
            let request = preflight(args.into_ingest_args())?;
            let store = connect(&cli.config).await?;
            let receipt = cmd_insert(store, request).await?;
            println!("{}", receipt.summary());
            Ok(())
        }
        Commands::Latest {
            project,
            version_name,
        } => {
            let store = connect(&cli.config).await?;
            let build = cmd_latest(store.as_ref(), &project, &version_name).await?;
            println!("{}", render_build(&project, &version_name, &build));
            Ok(())
        }
    }
}

/// Parse the request and check the artifact files without touching the store.
fn preflight(args: IngestArgs) -> Result<IngestRequest> {
    let request = IngestRequest::parse(args).context("Invalid insert arguments")?;
    bibliothek_core::artifact::validate(&request.downloads).context("Invalid insert arguments")?;
    Ok(request)
}

async fn connect(config_file: &Path) -> Result<Arc<dyn CatalogStore>> {
    let (config, source) = ConnectionConfig::from_env(Some(config_file))
        .with_context(|| format!("Failed to read {}", config_file.display()))?;
    info!(endpoint = %config.endpoint, source = %source, "Connecting to catalog");

    let store = SurrealCatalogStore::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to catalog at {}", config.endpoint))?;
    Ok(Arc::new(store))
}

async fn cmd_insert(store: Arc<dyn CatalogStore>, request: IngestRequest) -> Result<IngestReceipt> {
    let pipeline = IngestPipeline::new(store);
    let receipt = pipeline
        .run(request)
        .await
        .context("Build ingestion failed")?;
    Ok(receipt)
}

async fn cmd_latest(store: &dyn CatalogStore, project: &str, version: &str) -> Result<Build> {
    let found = store
        .find_project(project)
        .await
        .context("Failed to look up project")?
        .with_context(|| format!("Unknown project: {project}"))?;
    let version_record = store
        .find_version(&found, version)
        .await
        .context("Failed to look up version")?
        .with_context(|| format!("Unknown version {version} of {project}"))?;
    store
        .latest_build(&found, &version_record)
        .await
        .context("Failed to look up latest build")?
        .with_context(|| format!("No builds for {project} {version}"))
}

fn render_build(project: &str, version: &str, build: &Build) -> String {
    let mut out = format!(
        "{project} {version} build {} (Channel: {}, {}) {}\n",
        build.number,
        build.channel,
        build.display_mode.as_str(),
        build.created_at.to_rfc3339()
    );
    out.push_str("Downloads:\n");
    for (artifact_type, download) in &build.downloads {
        out.push_str(&format!(
            "  {artifact_type}: {} ({})\n",
            download.name,
            download.sha256.short()
        ));
    }
    out.push_str("Changes:\n");
    for change in &build.changes {
        let short: String = change.commit.chars().take(7).collect();
        out.push_str(&format!("  {short} {}\n", change.summary));
    }
    out.trim_end().to_string()
}
