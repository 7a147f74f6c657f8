// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge - conversational engagement for social-media coaching.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use nudge_config::NudgeConfig;
use nudge_core::ModeFlag;

/// Nudge - conversational engagement for social-media coaching.
#[derive(Parser, Debug)]
#[command(name = "nudge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway, agent loop and follow-up sweeper.
    Serve {
        /// Start in ads-only mode (templated replies, no AI calls).
        #[arg(long)]
        ads_only: bool,
    },
    /// Inspect or change the operating mode of a running server.
    Mode {
        /// Admin endpoint base URL. Defaults to the configured gateway address.
        #[arg(long)]
        url: Option<String>,

        #[command(subcommand)]
        action: ModeAction,
    },
    /// Manage Nudge configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ModeAction {
    /// Print the current mode.
    Get,
    /// Switch to `normal` or `ads_only`.
    Set {
        #[arg(value_parser = parse_mode)]
        mode: ModeFlag,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and print a summary.
    Check,
}

fn parse_mode(value: &str) -> Result<ModeFlag, String> {
    ModeFlag::from_str(value).map_err(|_| format!("expected 'normal' or 'ads_only', got '{value}'"))
}

fn load_config(path: Option<&PathBuf>) -> NudgeConfig {
    let loaded = match path {
        Some(path) => nudge_config::load_and_validate_path(path),
        None => nudge_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            nudge_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve { ads_only }) => {
            if let Err(e) = serve::run_serve(config, ads_only).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Mode { url, action }) => {
            let client = match admin::AdminClient::new(&config, url.as_deref()) {
                Ok(client) => client,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };
            let result = match action {
                ModeAction::Get => client.get_mode().await,
                ModeAction::Set { mode } => client.set_mode(mode).await,
            };
            match result {
                Ok(view) => println!("{}", view.describe()),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Config {
            action: ConfigAction::Check,
        }) => {
            println!("{}", config_summary(&config));
        }
        None => {
            println!("nudge: use --help for available commands");
        }
    }
}

fn config_summary(config: &NudgeConfig) -> String {
    let mode = ModeFlag::from_ads_only(config.mode.ads_only);
    format!(
        "config OK\n  agent:     {} (log level {})\n  mode:      {mode}\n  storage:   {:?} at {}\n  gateway:   {}:{} (admin {})\n  channel:   {}\n  responder: {} ({} attempts)",
        config.agent.name,
        config.agent.log_level,
        config.storage.backend,
        config.storage.database_path,
        config.gateway.host,
        config.gateway.port,
        if config.gateway.admin_token.is_some() { "enabled" } else { "disabled" },
        if config.channel.dry_run { "dry run" } else { config.channel.send_url.as_str() },
        config.responder.model,
        config.responder.max_attempts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_serve_and_mode_commands() {
        let cli = Cli::try_parse_from(["nudge", "serve", "--ads-only"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { ads_only: true })));

        let cli = Cli::try_parse_from(["nudge", "mode", "set", "ads_only"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Mode {
                action: ModeAction::Set {
                    mode: ModeFlag::AdsOnly
                },
                ..
            })
        ));

        assert!(Cli::try_parse_from(["nudge", "mode", "set", "turbo"]).is_err());
    }

    #[test]
    fn summary_reflects_config() {
        let mut config = NudgeConfig::default();
        config.mode.ads_only = true;
        config.channel.dry_run = true;
        let summary = config_summary(&config);
        assert!(summary.starts_with("config OK"));
        assert!(summary.contains("ads_only"));
        assert!(summary.contains("dry run"));
    }
}
