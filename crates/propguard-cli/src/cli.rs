use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "propguard")]
#[command(about = "Propguard CLI — validate and query property protection rules")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML); defaults to ./propguard.toml when present
    #[arg(short, long, global = true, env = "PROPGUARD_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Property protection file (overrides settings)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Rule format: roles or policies (overrides settings)
    #[arg(long, global = true)]
    pub rule_format: Option<String>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short = 'o', long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the protection file and list its rules
    Validate,
    /// Decide whether an operation on a property is permitted
    Check(CheckArgs),
    /// Keep the rules loaded and reload them when the file changes
    Watch,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Property name (e.g. x_owner_id)
    #[arg(short, long)]
    pub property: String,
    /// Operation: create, read, update or delete
    #[arg(long)]
    pub operation: String,
    /// Role held by the requester (repeatable)
    #[arg(short, long = "role")]
    pub roles: Vec<String>,
    /// Policy the requester satisfies, for the policies format (repeatable)
    #[arg(short, long = "grant-policy")]
    pub granted_policies: Vec<String>,
    /// Requester user ID
    #[arg(long)]
    pub user: Option<String>,
    /// Requester project ID
    #[arg(long)]
    pub project: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_with_repeated_grants() {
        let cli = Cli::parse_from([
            "propguard",
            "check",
            "--property",
            "x_owner_id",
            "--operation",
            "update",
            "-r",
            "admin",
            "--role",
            "member",
            "--grant-policy",
            "owner_only",
            "-o",
            "json",
        ]);

        let Commands::Check(args) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(args.property, "x_owner_id");
        assert_eq!(args.operation, "update");
        assert_eq!(args.roles, ["admin", "member"]);
        assert_eq!(args.granted_policies, ["owner_only"]);
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn test_check_requires_property() {
        assert!(Cli::try_parse_from(["propguard", "check", "--operation", "read"]).is_err());
    }
}
