//! Subcommand implementations. Each returns its output instead of printing
//! so `main` owns stdout.

pub mod batch;
pub mod fetch;
pub mod text;

use std::io::Read;
use std::path::Path;

use anyhow::Context;

/// Read a file, or all of stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}
