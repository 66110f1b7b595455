use std::path::PathBuf;

use clap::Parser;

/// Debug a notebook cell against a running kernel's debug backend.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Cell source to debug.
    pub source: PathBuf,

    /// Backend address, overriding `[backend] address` from the config.
    #[arg(short, long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Line to break on before the first start (repeatable).
    #[arg(short = 'b', long = "break", value_name = "LINE")]
    pub breaks: Vec<u32>,
}
