// content_filter - main.rs
// Loads the classifier once, then serves or answers a one-shot classification

use clap::Parser;
use content_filter::cli::{run, Cli};

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("content_filter: {e:#}");
        std::process::exit(1);
    }
}
