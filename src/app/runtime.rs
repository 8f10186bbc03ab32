use std::fs;

use anyhow::{Context, Result};
use bibfetch_core::{BatchError, Fetcher, RunReport};
use clap::Parser;
use tracing::{debug, info};

use crate::ProcessExit;
use crate::app::{config, exit_handler, input, terminal};
use crate::cli::Args;

pub(crate) async fn run_bibfetch() -> Result<ProcessExit> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures.
            return Ok(if err.use_stderr() {
                ProcessExit::Failure
            } else {
                ProcessExit::Success
            });
        }
    };

    let loaded = config::load_config(args.config.as_deref())?;
    let settings = config::resolve_settings(&args, loaded.config.as_ref())?;
    terminal::init_tracing(
        settings.log_level,
        settings.force_cli_log_level,
        terminal::is_no_color_requested(),
    );

    debug!(?args, "CLI arguments parsed");
    if loaded.config.is_some()
        && let Some(path) = &loaded.path
    {
        info!(path = %path.display(), "Loaded config file");
    }

    let identifiers = input::read_identifiers(&args.identifiers)?;
    if identifiers.is_empty() {
        print_quick_start_guidance();
        return Ok(ProcessExit::Success);
    }

    let output_dir = &settings.fetch.output_dir;
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory '{}'", output_dir.display())
        })?;
        info!(dir = %output_dir.display(), "Created output directory");
    }

    let fetcher = Fetcher::new(&settings.fetch).context("Failed to set up the fetch pipeline")?;
    info!(identifiers = identifiers.len(), mode = %fetcher.mode(), "bibfetch starting");

    let result = fetcher.run(identifiers.as_slice()).await;
    print_completion_summary(identifiers.len(), &result);
    Ok(exit_handler::determine_exit_outcome(&result))
}

fn print_quick_start_guidance() {
    eprintln!("No identifiers provided. Pass DOIs or ISBNs as arguments or pipe them via stdin.");
    eprintln!("Example: echo '10.1000/182' | bibfetch --mirror https://mirror.example");
}

fn print_completion_summary(inputs: usize, result: &Result<RunReport, BatchError>) {
    let (report, failures) = match result {
        Ok(report) => (report, &[][..]),
        Err(error) => (&error.report, error.failures.as_slice()),
    };

    for failure in failures {
        eprintln!("  {failure}");
    }
    println!("{}", summary_line(inputs, report, failures.len()));
}

fn summary_line(inputs: usize, report: &RunReport, failures: usize) -> String {
    let mut line = format!(
        "{inputs} identifier(s): {} document(s), {} citation(s)",
        report.documents(),
        report.citations()
    );
    if let Some(first) = report.citation_files.first() {
        line.push_str(&format!(" -> {}", first.display()));
        if report.citation_files.len() > 1 {
            line.push_str(&format!(" (+{} more)", report.citation_files.len() - 1));
        }
    }
    line.push_str(&format!(", {failures} failure(s)"));
    line
}
