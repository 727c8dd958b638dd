//! Command line arguments.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "formschema", version)]
#[command(about = "Download immigration forms and generate field schemas with the Extend API")]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (defaults to <config dir>/formschema/settings.json)
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// Seconds to wait before each status check
    #[arg(long, value_name = "SECS", global = true)]
    pub poll_interval: Option<f64>,

    /// Status checks before giving up on an edit run
    #[arg(long, value_name = "N", global = true)]
    pub max_attempts: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// `EnvFilter` directives for the requested verbosity.
    pub fn log_directives(&self) -> &'static [&'static str] {
        match self.verbose {
            0 => &["formschema=info"],
            1 => &["formschema=debug"],
            _ => &["formschema=trace", "reqwest=debug"],
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the form catalog
    List {
        /// Only forms from this source (uscis, eoir, other)
        #[arg(long)]
        source: Option<String>,
    },
    /// Download form PDFs
    Download(DownloadArgs),
    /// Generate a schema for one PDF or catalog form
    Generate(GenerateArgs),
    /// Download forms and generate a schema for each
    GenerateBatch(GenerateBatchArgs),
}

/// Which catalog forms a batch command works on.
#[derive(Args, Debug, Default)]
pub struct Selection {
    /// Form numbers, case-insensitive (e.g. I-130 eoir-42b)
    pub forms: Vec<String>,

    /// Every form from this source (uscis, eoir, other)
    #[arg(long)]
    pub source: Option<String>,

    /// Every form in the catalog
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Output directory (defaults to the data directory)
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Also download separate instructions where published
    #[arg(long)]
    pub instructions: bool,

    /// Forms downloaded at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["pdf", "form"])))]
pub struct GenerateArgs {
    /// Local PDF to extract a schema from
    #[arg(long, value_name = "PATH")]
    pub pdf: Option<PathBuf>,

    /// Catalog form to download and extract
    #[arg(long, value_name = "ID")]
    pub form: Option<String>,

    /// Output JSON path (defaults to <name>_Extend_Schema.json)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Extend API key (or set EXTEND_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct GenerateBatchArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Output directory for schema files (defaults to the data directory)
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Extend API key (or set EXTEND_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Forms processed at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}
