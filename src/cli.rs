// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use parley_config::ConfigLayer;

#[derive(Parser, Debug)]
#[command(
    name = "parley",
    about = "Converse with language models inside Markdown documents",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (merged after the discovered settings files)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Model to use, e.g. "gpt-4o".  Wins over document front-matter.
    #[arg(long, short = 'M', global = true)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Label of unlabeled user turns
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Directory holding config documents and logs
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Extra directory searched for embedded files
    #[arg(long, global = true, value_name = "DIR")]
    pub vault: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send the document to the model and append the reply
    Chat {
        /// Conversation document
        file: PathBuf,
    },
    /// Expand links, transcribe audio and append a token report, without
    /// calling the model
    Process { file: PathBuf },
    /// Enrich only the text after the last separator and append a token report
    Prompt { file: PathBuf },
    /// Print the token report of a document
    Tokens { file: PathBuf },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Command-line settings as the highest-precedence config layer.
    pub fn overrides(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        layer.model.name = self.model.clone();
        layer.model.temperature = self.temperature;
        layer.user.label = self.user.clone();
        layer.paths.data_dir = self.data_dir.clone();
        layer.paths.vault_dir = self.vault.clone();
        layer
    }
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "parley", &mut std::io::stdout());
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
