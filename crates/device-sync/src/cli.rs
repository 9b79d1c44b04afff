use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "device-sync")]
#[command(about = "Synchronize MRA device inventory and report security risk")]
pub struct Cli {
    /// Read from the local cache instead of the API
    #[arg(long, global = true)]
    pub local: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up known vulnerabilities for one patch level or OS version
    Vulns {
        #[arg(short, long, value_enum)]
        platform: PlatformArg,

        /// Android security patch level (YYYY-MM-DD) or iOS version
        #[arg(short, long)]
        version: String,
    },

    /// Print statistics for the cached devices
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Android,
    Ios,
}

impl PlatformArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformArg::Android => "android",
            PlatformArg::Ios => "ios",
        }
    }
}

impl Cli {
    /// Whether the command can run without an application key
    pub fn offline(&self) -> bool {
        self.local || matches!(self.command, Some(Command::Stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_sync() {
        let cli = Cli::try_parse_from(["device-sync"]).unwrap();
        assert!(!cli.local);
        assert!(cli.command.is_none());
        assert!(!cli.offline());
    }

    #[test]
    fn test_local_flag() {
        let cli = Cli::try_parse_from(["device-sync", "--local"]).unwrap();
        assert!(cli.local);
        assert!(cli.offline());
    }

    #[test]
    fn test_vulns_command() {
        let cli = Cli::try_parse_from([
            "device-sync",
            "vulns",
            "--platform",
            "android",
            "--version",
            "2024-01-05",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Vulns { platform, ref version }) => {
                assert_eq!(platform, PlatformArg::Android);
                assert_eq!(version, "2024-01-05");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!cli.offline());

        assert!(Cli::try_parse_from(["device-sync", "vulns", "-p", "windows", "-v", "1"]).is_err());
    }

    #[test]
    fn test_stats_needs_no_key() {
        let cli = Cli::try_parse_from(["device-sync", "stats"]).unwrap();
        assert!(cli.offline());
    }
}
