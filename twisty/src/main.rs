//! # Twisty Runtime
//!
//! Entry point for the twisty driver binary. Run with `--render` to pace the
//! simulation for a human observer, `--workers N` to roll out several
//! environments in parallel.

mod app;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    app::run(app::Args::parse())
}
