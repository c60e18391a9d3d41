//! Command-line interface for auris
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Always-on audio capture with wake-word triggered transcription
#[derive(Parser, Debug)]
#[command(
    name = "auris",
    version,
    about = "Always-on audio capture with wake-word triggered transcription"
)]
pub struct Cli {
    /// Subcommand to execute (default: list audio endpoints)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Audio endpoint to capture (ID from `auris devices`)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Whisper model name (e.g., base, base.en, small)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code for transcription (default: auto-detect)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audio endpoints
    Devices {
        /// Emit the endpoint list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the wake-word transcription pipeline until interrupted
    Listen,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["auris"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
        assert!(cli.device.is_none());
        assert!(cli.model.is_none());
        assert!(cli.language.is_none());
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["auris", "devices"]).unwrap();
        match cli.command {
            Some(Commands::Devices { json }) => assert!(!json),
            _ => panic!("Expected Devices command"),
        }
    }

    #[test]
    fn test_parse_devices_json() {
        let cli = Cli::try_parse_from(["auris", "devices", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Devices { json }) => assert!(json),
            _ => panic!("Expected Devices command"),
        }
    }

    #[test]
    fn test_parse_listen() {
        let cli = Cli::try_parse_from(["auris", "listen"]).unwrap();
        match cli.command {
            Some(Commands::Listen) => {}
            _ => panic!("Expected Listen command"),
        }
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "auris",
            "listen",
            "--device",
            "pipewire:42",
            "--model",
            "base.en",
            "--language",
            "en",
        ])
        .unwrap();

        assert_eq!(cli.device.as_deref(), Some("pipewire:42"));
        assert_eq!(cli.model.as_deref(), Some("base.en"));
        assert_eq!(cli.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["auris", "--config", "/path/to/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_options_after_command() {
        let cli =
            Cli::try_parse_from(["auris", "devices", "--config", "/tmp/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let result = Cli::try_parse_from(["auris", "invalid"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["auris", "--version"]);
        // Clap reports --version as an error with DisplayVersion kind
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["auris", "completions", "bash"]).unwrap();
        match cli.command {
            Some(Commands::Completions { shell }) => assert_eq!(shell, Shell::Bash),
            _ => panic!("Expected Completions command"),
        }
    }
}
