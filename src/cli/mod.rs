use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_GATEWAY_BIN, ENV_GATEWAY_BIN};

#[derive(Parser)]
#[command(
    name = "mylobster-sandbox",
    version,
    about = "Container bootstrap for the MyLobster gateway"
)]
pub struct Cli {
    /// Defaults to `start`.
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Gateway executable.
    #[arg(long, global = true, env = ENV_GATEWAY_BIN, default_value = DEFAULT_GATEWAY_BIN)]
    pub gateway_bin: String,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

impl Cli {
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Start)
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Mount storage, sync the config, then exec the gateway.
    Start,
    /// Inspect or synchronize the gateway config.
    Config(ConfigOpts),
    /// Print the gateway command line `start` would exec.
    LaunchArgs,
}

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Create the config if missing and merge the environment into it.
    Sync,
    /// Print the merged config without writing it.
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_start() {
        let cli = Cli::try_parse_from(["mylobster-sandbox"]).unwrap();
        assert_eq!(cli.command(), &Commands::Start);
        assert!(!cli.json_logs);
    }

    #[test]
    fn gateway_bin_before_or_after_subcommand() {
        let cli =
            Cli::try_parse_from(["mylobster-sandbox", "--gateway-bin", "/usr/bin/gw"]).unwrap();
        assert_eq!(cli.gateway_bin, "/usr/bin/gw");
        assert_eq!(cli.command(), &Commands::Start);

        let cli = Cli::try_parse_from(["mylobster-sandbox", "launch-args", "--gateway-bin", "gw"])
            .unwrap();
        assert_eq!(cli.gateway_bin, "gw");
        assert_eq!(cli.command(), &Commands::LaunchArgs);
    }

    #[test]
    fn config_show_parses() {
        let cli =
            Cli::try_parse_from(["mylobster-sandbox", "--json-logs", "config", "show"]).unwrap();
        assert!(cli.json_logs);
        assert_eq!(
            cli.command(),
            &Commands::Config(ConfigOpts {
                action: ConfigAction::Show
            })
        );
    }
}
