use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gemdb",
    about = "gemdb: reconcile gem metadata into a package/version/dependency database",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, or `:memory:`
    #[arg(long, global = true)]
    pub database: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest gemspecs from a JSON or JSON-lines file
    Ingest(IngestArgs),
    /// Check whether a version is already stored
    Lookup(LookupArgs),
    /// Show row counts
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Gemspec file; `-` reads standard input
    pub file: PathBuf,
    /// Worker threads (defaults to the configured count)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,
    /// Platform reported by the index, overriding each gemspec's own
    #[arg(long)]
    pub platform: Option<String>,
    /// Mark the versions as present in the index
    #[arg(long, conflicts_with = "not_indexed")]
    pub indexed: bool,
    /// Record new versions as absent from the index
    #[arg(long)]
    pub not_indexed: bool,
}

impl IngestArgs {
    /// The three-valued `indexed` flag handed to the reconciler.
    pub fn indexed(&self) -> Option<bool> {
        match (self.indexed, self.not_indexed) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args)]
pub struct LookupArgs {
    pub name: String,
    pub version: String,
    #[arg(long)]
    pub platform: Option<String>,
}

#[derive(Args)]
pub struct StatsArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ingest() {
        let cli = Cli::try_parse_from(["gemdb", "ingest", "specs.json"]).unwrap();
        if let Command::Ingest(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("specs.json"));
            assert_eq!(args.workers, None);
            assert_eq!(args.indexed(), None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ingest_with_options() {
        let cli = Cli::try_parse_from([
            "gemdb", "ingest", "-j", "8", "--platform", "java", "--indexed", "-",
        ])
        .unwrap();
        if let Command::Ingest(args) = cli.command {
            assert_eq!(args.workers, Some(8));
            assert_eq!(args.platform.as_deref(), Some("java"));
            assert_eq!(args.indexed(), Some(true));
            assert_eq!(args.file, PathBuf::from("-"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ingest_not_indexed() {
        let cli = Cli::try_parse_from(["gemdb", "ingest", "--not-indexed", "a.json"]).unwrap();
        if let Command::Ingest(args) = cli.command {
            assert_eq!(args.indexed(), Some(false));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn indexed_flags_conflict() {
        let res = Cli::try_parse_from(["gemdb", "ingest", "--indexed", "--not-indexed", "a.json"]);
        assert!(res.is_err());
    }

    #[test]
    fn parse_lookup() {
        let cli = Cli::try_parse_from(["gemdb", "lookup", "rails", "4.0.0", "--platform", "java"]).unwrap();
        if let Command::Lookup(args) = cli.command {
            assert_eq!(args.name, "rails");
            assert_eq!(args.version, "4.0.0");
            assert_eq!(args.platform.as_deref(), Some("java"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_stats_with_globals() {
        let cli = Cli::try_parse_from([
            "gemdb", "stats", "--database", ":memory:", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Stats(_)));
        assert_eq!(cli.database.as_deref(), Some(":memory:"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::try_parse_from(["gemdb", "--config", "gemdb.toml", "stats"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("gemdb.toml")));
    }

    #[test]
    fn lookup_requires_version() {
        assert!(Cli::try_parse_from(["gemdb", "lookup", "rails"]).is_err());
    }
}
