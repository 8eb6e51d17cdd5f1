use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-hierarchy")]
#[command(about = "Answer superclass and interface questions about Java types from their sources")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Source directory or source archive, searched in the given order.
    #[arg(short = 's', long = "source", value_name = "PATH", global = true)]
    pub sources: Vec<PathBuf>,

    #[arg(long, value_name = "PATH", global = true)]
    pub m2: Option<PathBuf>,

    /// Append every `*-sources.jar` from the Maven repository.
    #[arg(long, global = true)]
    pub m2_sources: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Supertype {
        type_name: String,
    },
    Interfaces {
        type_name: String,
    },
    Extends {
        type_name: String,
        super_name: String,
    },
    Implements {
        type_name: String,
        interface_name: String,
    },
    /// Answer JSON-lines queries from a file (`-` for stdin) with one engine.
    Batch {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
