pub mod presenter;
pub mod report;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::types::SelectionMode;

/// Command-line arguments for neuroselect
#[derive(Parser, Debug)]
#[command(name = "neuroselect")]
#[command(about = "Select input series and the reference space for one subject")]
#[command(version)]
pub struct Cli {
    /// Directory of converted volumes for one subject
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Subject id; defaults to the directory name
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Flat KEY=value configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Selection mode for T1 (overrides configuration)
    #[arg(long, value_parser = parse_mode)]
    pub t1_mode: Option<SelectionMode>,

    /// Selection mode for FLAIR (overrides configuration)
    #[arg(long, value_parser = parse_mode)]
    pub flair_mode: Option<SelectionMode>,

    /// Prompt to review the reference decision
    #[arg(short, long)]
    pub interactive: bool,

    /// Root directory for decision records; nothing is persisted without it
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Command-line arguments for neurosel
#[derive(Parser, Debug)]
#[command(name = "neurosel")]
#[command(about = "Inspect and score a single NIfTI or DICOM volume")]
#[command(version)]
pub struct InspectCli {
    /// Path to the volume file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Modality to score the volume as; detected from the file name if omitted
    #[arg(short, long)]
    pub modality: Option<String>,

    /// Flat KEY=value configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
    /// Decision record text
    Record,
}

fn parse_mode(s: &str) -> Result<SelectionMode, String> {
    SelectionMode::parse(s).ok_or_else(|| format!("unknown selection mode '{}'", s))
}
