use anyhow::Context;
use clap::Parser;
use mylobster_sandbox::bootstrap::{self, BootstrapOutcome};
use mylobster_sandbox::cli::{Cli, Commands, ConfigAction};
use mylobster_sandbox::config::{sync_config, BootstrapSettings, EnvSnapshot, MOUNT_BIN};
use mylobster_sandbox::infra::probe::SystemProbe;
use mylobster_sandbox::launcher::{exec_gateway, GatewayInvocation};
use mylobster_sandbox::logging;
use mylobster_sandbox::storage::S3fsRunner;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let env = EnvSnapshot::from_process();
    let settings = BootstrapSettings {
        gateway_bin: cli.gateway_bin.clone(),
        ..BootstrapSettings::default()
    };

    match cli.command() {
        Commands::Start => start(&settings, &env).await?,
        Commands::Config(opts) => match opts.action {
            ConfigAction::Sync => {
                let sync = sync_config(&settings.paths, &env, true)
                    .context("Failed to synchronize config")?;
                info!(
                    changed = sync.changed(),
                    "Config written to {}",
                    settings.paths.config_file.display()
                );
            }
            ConfigAction::Show => {
                let sync = sync_config(&settings.paths, &env, false)
                    .context("Failed to build config")?;
                println!("{}", serde_json::to_string_pretty(&sync.document)?);
            }
        },
        Commands::LaunchArgs => {
            let invocation = GatewayInvocation::new(&settings.gateway_bin, env.gateway_token());
            println!("{} {}", invocation.program, invocation.redacted_args().join(" "));
        }
    }

    Ok(())
}

async fn start(settings: &BootstrapSettings, env: &EnvSnapshot) -> anyhow::Result<()> {
    let probe = SystemProbe::new(&settings.gateway_bin);
    let runner = S3fsRunner::new(MOUNT_BIN);

    match bootstrap::prepare(settings, env, &probe, &runner).await {
        BootstrapOutcome::AlreadyRunning => Ok(()),
        BootstrapOutcome::Ready { invocation, .. } => {
            let err = match exec_gateway(&invocation) {
                Ok(never) => match never {},
                Err(e) => e,
            };
            Err::<(), _>(err)
                .with_context(|| format!("Failed to start gateway '{}'", invocation.program))
        }
    }
}
