//! Assembly of the identifier list from positional arguments and/or stdin.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};

/// Collects identifiers from `args`, then from stdin when it is piped.
pub(crate) fn read_identifiers(args: &[String]) -> Result<Vec<String>> {
    let stdin = io::stdin();
    let piped = !stdin.is_terminal();
    collect_identifiers(args, piped.then_some(stdin.lock()))
}

fn collect_identifiers(args: &[String], piped: Option<impl Read>) -> Result<Vec<String>> {
    let mut identifiers: Vec<String> = args
        .iter()
        .flat_map(|arg| arg.split_whitespace())
        .map(str::to_string)
        .collect();

    if let Some(mut reader) = piped {
        let mut buffer = String::new();
        reader
            .read_to_string(&mut buffer)
            .context("Failed to read identifiers from stdin")?;
        identifiers.extend(buffer.split_whitespace().map(str::to_string));
    }

    Ok(identifiers)
}
