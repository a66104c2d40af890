//! mendsync: keep Mendeley Desktop file links in step across machines.
//!
//! # Usage
//!
//! ```text
//! mendsync <DATABASE> <SNAPSHOT> <FILE_ROOT> [-d|--dry-run] [--json]
//! ```
//!
//! `DATABASE` is the Mendeley Desktop SQLite catalog, `SNAPSHOT` a text file
//! shared between machines (for example through a file-sync service) and
//! `FILE_ROOT` the synchronized directory holding the documents.

mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use mendsync_sync::{pipeline, Mode, SyncConfig};

#[derive(Parser, Debug)]
#[command(
    name = "mendsync",
    version,
    about = "Synchronise Mendeley Desktop file links through a portable snapshot",
    long_about = None,
)]
struct Cli {
    /// Mendeley Desktop SQLite database.
    database: PathBuf,

    /// Snapshot file shared between machines. Created on first run.
    snapshot: PathBuf,

    /// Directory holding the synchronized documents.
    file_root: PathBuf,

    /// Show what would change without touching the database or the snapshot.
    #[arg(short = 'd', long)]
    dry_run: bool,

    /// Emit a machine-readable JSON report.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn run(self) -> Result<()> {
        let database = expand_home(&self.database)?;
        let snapshot = expand_home(&self.snapshot)?;
        let file_root = expand_home(&self.file_root)?;

        if !database.is_file() {
            bail!("database not found: {}", database.display());
        }
        if !file_root.is_dir() {
            bail!("file root is not a directory: {}", file_root.display());
        }

        let mode = Mode::from_dry_run(self.dry_run);
        let config = SyncConfig::new(&database, &snapshot, &file_root, mode)
            .context("invalid sync configuration")?;
        tracing::debug!(?config, "starting sync");

        let outcome = pipeline::run(&config)
            .with_context(|| format!("sync failed for {}", database.display()))?;

        if self.json {
            println!("{}", report::render_json(&outcome)?);
            return Ok(());
        }
        if !outcome.baseline_existed {
            let verb = if self.dry_run { "would be" } else { "was" };
            println!(
                "No snapshot found at {}; a new one {verb} created from the catalog.",
                snapshot.display()
            );
        }
        print!("{}", report::render_human(&outcome));
        Ok(())
    }
}

/// Expand a leading `~` component to the home directory.
fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(rest))
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    Cli::parse().run()
}
