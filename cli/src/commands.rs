//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for parley
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about = "Terminal client for a multi-model chat backend")]
#[command(long_about = r#"
parley talks to a chat backend that answers either with a single model,
streamed token by token, or with a council of models that deliberate in
rounds until they agree (consensus).

Configuration files are loaded from (in priority order):
1. --config <path>   Explicit config file
2. ./parley.toml     Project-level config
3. ~/.config/parley/config.toml   Global config

Example:
  parley                                  # open the chat REPL
  parley "Why is the sky blue?"           # one-shot direct question
  parley --consensus "Is P equal to NP?"  # one-shot consensus question
"#)]
pub struct Cli {
    /// One-shot question (omit to open the chat REPL)
    pub question: Option<String>,

    /// Resolve the one-shot question by consensus instead of a direct stream
    #[arg(long)]
    pub consensus: bool,

    /// Model used for new sessions (overrides configuration)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Backend base URL (overrides configuration)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,
}
