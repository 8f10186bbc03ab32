//! CLI argument definitions using clap derive macros.
//!
//! Every option that can also come from the config file is an `Option`, so
//! `None` means "not given on the command line".

use std::path::PathBuf;

use bibfetch_core::{CitationFormat, FetchMode};
use clap::Parser;

/// Resolve DOIs and ISBNs into metadata, source documents and citations.
///
/// Identifiers are taken from the arguments, or whitespace-separated from
/// stdin when it is piped.
#[derive(Parser, Debug)]
#[command(name = "bibfetch")]
#[command(author, version, about)]
pub struct Args {
    /// DOIs or ISBNs to fetch
    #[arg(value_name = "IDENTIFIER")]
    pub identifiers: Vec<String>,

    /// What to fetch: full, source or cite [default: full]
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<FetchMode>,

    /// Citation format (bibtex, ris, citeprocjson, ...) [default: bibtex]
    #[arg(short, long, value_name = "NAME")]
    pub format: Option<CitationFormat>,

    /// Write one citation file per article instead of one combined file
    #[arg(short, long, conflicts_with = "citation_file")]
    pub separate: bool,

    /// Append to existing citation files instead of truncating them
    #[arg(short, long)]
    pub append: bool,

    /// Combined citation file path [default: <output-dir>/citations.<ext>]
    #[arg(short = 'o', long, value_name = "PATH")]
    pub citation_file: Option<PathBuf>,

    /// Directory for documents and citation files [default: .]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout in seconds (1-3600) [default: 10]
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Outbound requests per second, 0 to disable (max 1000) [default: 50]
    #[arg(short = 'l', long, value_name = "N", value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub rate_limit: Option<u32>,

    /// Document mirror for DOIs, tried in the order given (repeatable)
    #[arg(long = "mirror", value_name = "URL")]
    pub mirrors: Vec<String>,

    /// Catalog mirror for ISBNs, tried in the order given (repeatable)
    #[arg(long = "catalog-mirror", value_name = "URL")]
    pub catalog_mirrors: Vec<String>,

    /// Contact address sent to the registry and in the User-Agent
    #[arg(long, value_name = "ADDR")]
    pub mailto: Option<String>,

    /// Config file [default: $XDG_CONFIG_HOME/bibfetch/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["bibfetch"]).unwrap();
        assert!(args.identifiers.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.mode.is_none());
        assert!(args.format.is_none());
        assert!(args.timeout.is_none());
        assert!(args.mirrors.is_empty());
    }

    #[test]
    fn test_cli_positional_identifiers() {
        let args = Args::try_parse_from(["bibfetch", "10.1000/abc", "9780136091813"]).unwrap();
        assert_eq!(args.identifiers, vec!["10.1000/abc", "9780136091813"]);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["bibfetch", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_verbose_conflicts_with_quiet() {
        let err = Args::try_parse_from(["bibfetch", "-v", "-q"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_separate_conflicts_with_citation_file() {
        let err = Args::try_parse_from(["bibfetch", "--separate", "-o", "refs.bib"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_mode_and_format_parse() {
        let args = Args::try_parse_from(["bibfetch", "-m", "cite", "-f", "RIS"]).unwrap();
        assert_eq!(args.mode, Some(FetchMode::CiteOnly));
        assert_eq!(args.format, Some(CitationFormat::Ris));

        let err = Args::try_parse_from(["bibfetch", "--format", "mla"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_range() {
        let args = Args::try_parse_from(["bibfetch", "-t", "3600"]).unwrap();
        assert_eq!(args.timeout, Some(3600));
        assert!(Args::try_parse_from(["bibfetch", "-t", "0"]).is_err());
        assert!(Args::try_parse_from(["bibfetch", "-t", "3601"]).is_err());
    }

    #[test]
    fn test_cli_rate_limit_range() {
        let args = Args::try_parse_from(["bibfetch", "-l", "0"]).unwrap();
        assert_eq!(args.rate_limit, Some(0));
        assert!(Args::try_parse_from(["bibfetch", "-l", "1001"]).is_err());
    }

    #[test]
    fn test_cli_repeatable_mirrors_keep_order() {
        let args = Args::try_parse_from([
            "bibfetch",
            "--mirror",
            "https://m1.example",
            "--mirror",
            "m2.example",
            "--catalog-mirror",
            "https://books.example",
        ])
        .unwrap();
        assert_eq!(args.mirrors, vec!["https://m1.example", "m2.example"]);
        assert_eq!(args.catalog_mirrors, vec!["https://books.example"]);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["bibfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["bibfetch", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
