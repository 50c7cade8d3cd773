// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lcloudd: watches the repository and builds every new commit across
//! the host, the cloud and its guest VMs.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lc_core::Stage;
use lc_daemon::commands::{build, install, ledger, run, stage};
use lc_daemon::{env, logging, ExitError, Paths};

#[derive(Parser)]
#[command(name = "lcloudd", version = env::VERSION, about = "Distributed build daemon for Full Crisis")]
struct Cli {
    /// Config file (default: $LCLOUD_CONFIG or ~/.config/lcloud/lcloud.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch for new commits and build them (default)
    Run,
    /// Perform one role on this machine and exit
    Stage {
        /// host, cloud, guest-win11 or guest-macos
        role: Stage,
    },
    /// Run one build attempt for a commit and exit
    Build {
        commit: String,
        /// Build even if the ledger says to skip this commit
        #[arg(long)]
        force: bool,
    },
    /// Inspect or edit the build-attempt ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Install and start the systemd service
    Install {
        /// Where to write the unit file
        #[arg(long)]
        unit_dir: Option<PathBuf>,
        /// Run the service as this user
        #[arg(long)]
        user: Option<String>,
        /// Only write the unit file
        #[arg(long)]
        no_enable: bool,
    },
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// Show live entries, or one commit's entry
    Show { commit: Option<String> },
    /// Forgive a commit's recorded failures
    Reset { commit: String },
}

fn main() {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("lcloudd: failed to start async runtime: {e}");
            std::process::exit(ExitError::FATAL);
        }
    };
    if let Err(e) = runtime.block_on(dispatch(cli)) {
        let code = e.downcast_ref::<ExitError>().map(|e| e.code).unwrap_or(ExitError::FATAL);
        eprintln!("lcloudd: {e:#}");
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let paths = Paths::load()?;
    let config = match cli.config {
        Some(path) => path,
        None => env::config_path()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let _guard = logging::init(Some(&paths.logs_path))?;
            run::run(&config, &paths).await?;
        }
        Command::Stage { role } => {
            let _guard = logging::init(None)?;
            stage::stage(&config, role).await?;
        }
        Command::Build { commit, force } => {
            let _guard = logging::init(Some(&paths.logs_path))?;
            build::build(&config, &paths, &commit, force).await?;
        }
        Command::Ledger { command: LedgerCommand::Show { commit } } => {
            ledger::show(&paths, commit.as_deref())?;
        }
        Command::Ledger { command: LedgerCommand::Reset { commit } } => {
            let _guard = logging::init(None)?;
            ledger::reset(&config, &paths, &commit)?;
        }
        Command::Install { unit_dir, user, no_enable } => {
            install::install(&config, &paths, unit_dir, user, !no_enable).await?;
        }
    }
    Ok(())
}
