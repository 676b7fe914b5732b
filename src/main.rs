use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Instrument;

use speedledger::config::Config;
use speedledger::controller::{RunController, RunOutcome};
use speedledger::geo::{IpInfoClient, LocationProvider};
use speedledger::identity::Identity;
use speedledger::measure::OoklaCliProvider;
use speedledger::remote::DropboxStore;

#[derive(Parser)]
#[command(
    name = "speedledger",
    about = "Gated internet speed measurements with a cloud-mirrored ledger",
    version,
    long_about = None
)]
struct Cli {
    /// Config file path (overrides SPEEDLEDGER_CONFIG and ./speedledger.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one gated measurement and mirror the results
    Run,

    /// Query the remote run gate (no side effects)
    Gate,

    /// Print the effective configuration as TOML
    Config,
}

// Exit codes: 0 completed and synced, 2 gate skipped, 3 identify/enrich/
// measure/append failure, 4 completed but the mirror push failed.
const EXIT_GATE_SKIPPED: u8 = 2;
const EXIT_RUN_FAILED: u8 = 3;
const EXIT_SYNC_FAILED: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    let resolved = Config::resolve(cli.config.as_deref())?;
    let config = &resolved.config;

    match cli.command {
        Commands::Config => {
            speedledger::logging::init_console(&config.logging);
            resolved.emit_warnings();
            print!("{}", toml::to_string_pretty(config)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Gate => {
            speedledger::logging::init_console(&config.logging);
            resolved.emit_warnings();
            config.require_remote_credentials()?;

            let store = DropboxStore::new(&config.remote);
            let open = speedledger::gate::check(&store, &config.remote.gate_path()).await;
            println!("{}", if open { "open" } else { "closed" });
            Ok(if open {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_GATE_SKIPPED)
            })
        }

        Commands::Run => {
            speedledger::logging::init(&config.logging, &config.storage.log_path())?;
            resolved.emit_warnings();
            config.require_remote_credentials()?;

            let store = DropboxStore::new(&config.remote);
            let resolver = Identity::new(config.identity.source, config.identity.echo_url.clone());
            let locator = config.geolocation.enabled().then(|| {
                IpInfoClient::new(
                    config.geolocation.api_base.clone(),
                    config.geolocation.token.clone(),
                )
            });
            let provider = OoklaCliProvider::default();

            let controller = RunController::new(
                config,
                &store,
                &resolver,
                locator.as_ref().map(|l| l as &dyn LocationProvider),
                &provider,
            );

            let run_id = uuid::Uuid::new_v4();
            let outcome = controller
                .run()
                .instrument(tracing::info_span!("run", %run_id))
                .await;

            Ok(match outcome {
                RunOutcome::GateSkipped => ExitCode::from(EXIT_GATE_SKIPPED),
                RunOutcome::Completed { synced } if synced.all_ok() => ExitCode::SUCCESS,
                RunOutcome::Completed { .. } => ExitCode::from(EXIT_SYNC_FAILED),
                RunOutcome::Failed(_) => ExitCode::from(EXIT_RUN_FAILED),
            })
        }
    }
}
