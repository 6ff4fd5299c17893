use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Prompt Tuner - schema-driven forms and result views for backend workflows
#[derive(Parser, Debug, Clone)]
#[command(name = "prompt-tuner", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "PROMPT_TUNER_CONFIG",
        default_value = crate::config::DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, global = true, env = "PROMPT_TUNER_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true, env = "PROMPT_TUNER_PORT")]
    pub port: Option<u16>,

    /// Base URL of the workflow backend
    #[arg(long, global = true, env = "API_BASE_URL")]
    pub backend_url: Option<String>,

    /// Read schemas from this directory instead of the backend
    #[arg(long, global = true, env = "PROMPT_TUNER_SCHEMA_DIR")]
    pub schema_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print the form generated for a workflow schema
    Form {
        /// Workflow (schema) name
        schema: String,
        /// Explicit root type name
        #[arg(long)]
        root: Option<String>,
        /// JSON file with values to prefill the form from
        #[arg(long)]
        values: Option<PathBuf>,
        /// Print form markup instead of the JSON description
        #[arg(long)]
        html: bool,
    },

    /// Validate a data file against a workflow schema
    Validate {
        schema: String,
        /// JSON file with the data tree
        data: PathBuf,
        #[arg(long)]
        root: Option<String>,
    },

    /// Render a result payload
    Render {
        /// JSON file with the payload
        payload: PathBuf,
        /// auto, table, cards or raw
        #[arg(long)]
        view: Option<String>,
    },

    /// Export a result payload to a file
    Export {
        payload: PathBuf,
        /// json, csv or html
        #[arg(long)]
        format: String,
        /// Output file; defaults to the configured base name
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List workflows known to the backend
    Workflows,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
