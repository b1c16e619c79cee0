//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "triage")]
#[command(about = "Plan and score bounded diagnostic triage runs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Copilot configuration file (YAML)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Template directory, overrides `templates.dir` from the config
    #[arg(long, global = true)]
    pub templates: Option<PathBuf>,

    /// Debug logging (RUST_LOG still takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect the template catalog
    Templates {
        #[command(subcommand)]
        action: TemplateCommands,
    },

    /// Build the bounded plan for a triage target
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Score executed step results for a triage target
    Evidence {
        #[command(flatten)]
        request: RequestArgs,

        /// JSON file holding an array of `{ "tool": ..., "result": ... }`
        #[arg(long)]
        results: PathBuf,

        /// Observed rubric input (key=value, value parsed as JSON)
        #[arg(long = "signal", value_name = "KEY=VALUE")]
        signals: Vec<String>,
    },

    /// Evaluate one rubric against a set of inputs
    Rubric {
        /// Built-in rubric id, e.g. triage-priority.v1
        #[arg(long, conflicts_with = "file")]
        id: Option<String>,

        /// Rubric definition file (.json, .yaml or .yml)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Inputs as a JSON object, or @path to a JSON file
        #[arg(long, default_value = "{}")]
        inputs: String,
    },

    /// Evaluate a boolean expression
    Expr {
        expression: String,

        /// Variables as a JSON object, or @path to a JSON file
        #[arg(long, default_value = "{}")]
        vars: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TemplateCommands {
    /// List loaded templates
    List,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RequestArgs {
    /// Triage target, e.g. scheduling-failures
    #[arg(long)]
    pub target: String,

    #[arg(long, short)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub session: Option<String>,

    /// Template variable (key=value, value parsed as JSON)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Upper bound on planned steps
    #[arg(long)]
    pub budget: Option<usize>,
}
