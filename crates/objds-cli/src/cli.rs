use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "objds",
    about = "Key-value datastore over a bucket-oriented object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Datastore configuration file
    #[arg(short, long, global = true, default_value = "objds.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the configured bucket if it does not exist
    Init,
    /// Store a value under a key
    Put(PutArgs),
    /// Print the value stored under a key
    Get(KeyArgs),
    /// Report whether a key exists
    Has(KeyArgs),
    /// Print the size of the value stored under a key
    Size(KeyArgs),
    /// Delete a key
    Rm(KeyArgs),
    /// List keys under a prefix
    Ls(LsArgs),
    /// Flush writes under a prefix
    Sync(SyncArgs),
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    /// Value to store (mutually exclusive with --file)
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub value: Option<String>,
    /// Read the value from this file
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub prefix: String,
    /// Do not fetch values
    #[arg(short, long)]
    pub keys_only: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    #[arg(default_value = "/")]
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_put_with_file() {
        let cli = Cli::parse_from(["objds", "put", "/k", "--file", "v.bin"]);
        match cli.command {
            Command::Put(args) => {
                assert_eq!(args.key, "/k");
                assert!(args.value.is_none());
                assert_eq!(args.file, Some(PathBuf::from("v.bin")));
            }
            _ => panic!("expected put"),
        }
    }

    #[test]
    fn put_requires_a_value() {
        assert!(Cli::try_parse_from(["objds", "put", "/k"]).is_err());
        assert!(Cli::try_parse_from(["objds", "put", "/k", "v", "--file", "f"]).is_err());
    }

    #[test]
    fn global_flags() {
        let cli = Cli::parse_from([
            "objds",
            "ls",
            "--keys-only",
            "--format",
            "json",
            "-c",
            "x.toml",
        ]);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        match cli.command {
            Command::Ls(args) => {
                assert_eq!(args.prefix, "/");
                assert!(args.keys_only);
            }
            _ => panic!("expected ls"),
        }
    }
}
