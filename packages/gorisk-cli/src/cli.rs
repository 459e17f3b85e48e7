//! Command-line surface
//!
//! Exit codes: 0 ok, 1 threshold exceeded, 2 invocation error.

use clap::{Args, Parser, Subcommand, ValueEnum};
use gorisk_ir::{Language, RiskLevel};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "gorisk",
    about = "Dependency capability and risk analysis",
    version
)]
pub struct Cli {
    /// Project directory to analyze.
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Ecosystem override (auto-detected by default).
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub lang: LangArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LangArg {
    Auto,
    Go,
    Javascript,
}

impl LangArg {
    pub fn to_language(self) -> Option<Language> {
        match self {
            LangArg::Auto => None,
            LangArg::Go => Some(Language::Go),
            LangArg::Javascript => Some(Language::JavaScript),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskArg {
    Low,
    Medium,
    High,
}

impl RiskArg {
    pub fn to_level(self) -> RiskLevel {
        match self {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

#[derive(Debug, Args)]
pub struct OutputOpts {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Hide rows below this risk level.
    #[arg(long, value_enum)]
    pub min_risk: Option<RiskArg>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Per-package capability sets and risk levels.
    Capabilities {
        #[command(flatten)]
        output: OutputOpts,
    },

    /// Module-level transitive and composite risk table.
    Graph {
        #[command(flatten)]
        output: OutputOpts,
    },

    /// Aggregated capability, health and taint report; CI gate.
    Scan {
        #[command(flatten)]
        output: OutputOpts,

        /// Emit SARIF 2.1 to stdout.
        #[arg(long)]
        sarif: bool,

        /// Exit 1 when any module reaches this level.
        #[arg(long, value_enum)]
        fail_on: Option<RiskArg>,

        /// Policy JSON with allow-list exceptions.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// JSON file mapping module path to known CVE count.
        #[arg(long)]
        cves: Option<PathBuf>,
    },

    /// Reachability flag per capability-carrying dependency.
    Reachability {
        #[command(flatten)]
        output: OutputOpts,

        /// Restrict roots to the package declaring this file.
        entry: Option<PathBuf>,
    },

    /// Blast radius of removing a module.
    Impact {
        /// Target `module[@version]`.
        module: String,

        #[command(flatten)]
        output: OutputOpts,
    },

    /// Risk of upgrading a module to a new version.
    Upgrade {
        /// Target `module@version` (the version to upgrade to).
        module: String,

        #[command(flatten)]
        output: OutputOpts,
    },

    /// Capability diff between two pinned versions.
    Diff {
        /// `module@oldVersion`.
        old: String,
        /// `module@newVersion`.
        new: String,

        #[command(flatten)]
        output: OutputOpts,
    },

    /// Dependency changes between two git refs (pull-request mode).
    Pr {
        #[arg(long, default_value = "HEAD~1")]
        base: String,

        #[arg(long, default_value = "HEAD")]
        head: String,

        #[command(flatten)]
        output: OutputOpts,
    },

    /// Snapshot history: record, diff, show, trend.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Software bill of materials.
    Sbom {
        /// Output format (only cyclonedx).
        #[arg(long, default_value = "cyclonedx")]
        format: String,
    },

    /// License per module with a risky flag.
    Licenses {
        #[command(flatten)]
        output: OutputOpts,

        /// Exit 1 when any license is risky or unknown.
        #[arg(long)]
        fail_on_risky: bool,
    },

    /// Grouped evidence listing.
    Explain {
        /// Only this capability.
        #[arg(long)]
        cap: Option<String>,

        #[command(flatten)]
        output: OutputOpts,
    },
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// Record a snapshot of the current analysis.
    Record {
        #[command(flatten)]
        output: OutputOpts,
    },
    /// Diff two snapshots (defaults to the last two).
    Diff {
        old: Option<usize>,
        new: Option<usize>,
        #[command(flatten)]
        output: OutputOpts,
    },
    /// Show one snapshot (defaults to the latest).
    Show {
        index: Option<usize>,
        #[command(flatten)]
        output: OutputOpts,
    },
    /// Sparkline trend per module.
    Trend {
        /// Substring filter on module paths.
        #[arg(long)]
        module: Option<String>,
        #[command(flatten)]
        output: OutputOpts,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_with_gate() {
        let cli = Cli::try_parse_from([
            "gorisk", "scan", "--json", "--fail-on", "high", "--policy", "p.json",
        ])
        .unwrap();
        match cli.command {
            Command::Scan {
                fail_on, policy, ..
            } => {
                assert_eq!(fail_on, Some(RiskArg::High));
                assert_eq!(policy.unwrap().to_string_lossy(), "p.json");
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_history_trend() {
        let cli =
            Cli::try_parse_from(["gorisk", "history", "trend", "--module", "acme"]).unwrap();
        match cli.command {
            Command::History {
                action: HistoryAction::Trend { module, .. },
            } => assert_eq!(module.as_deref(), Some("acme")),
            _ => panic!("wrong command"),
        }
    }
}
