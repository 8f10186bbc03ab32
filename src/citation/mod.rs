//! Citations: the format catalog, the per-article fetcher and the file writer.

mod fetcher;
mod writer;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use fetcher::CitationFetcher;
pub use writer::{CitationLayout, CitationWriter};

/// Citation output format, selected once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CitationFormat {
    /// BibTeX (`.bib`)
    #[default]
    Bibtex,
    /// Citation Style Language JSON (`.json`)
    CiteprocJson,
    /// RDF/XML (`.rdf`)
    RdfXml,
    /// RDF Turtle (`.ttl`)
    RdfTurtle,
    /// Research Information Systems (`.ris`)
    Ris,
    /// schema.org JSON-LD (`.jsonld`)
    SchemaOrgJson,
    /// Formatted plain-text bibliography entry (`.txt`)
    TextCitation,
    /// Crossref UNIXREF XML (`.xml`)
    UnixrefXml,
    /// Crossref UNIXSD XML (`.xml`)
    UnixsdXml,
}

impl CitationFormat {
    /// Every supported format, in display order.
    pub const ALL: [Self; 9] = [
        Self::Bibtex,
        Self::CiteprocJson,
        Self::RdfXml,
        Self::RdfTurtle,
        Self::Ris,
        Self::SchemaOrgJson,
        Self::TextCitation,
        Self::UnixrefXml,
        Self::UnixsdXml,
    ];

    /// Name accepted on the command line and in config.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bibtex => "bibtex",
            Self::CiteprocJson => "citeprocjson",
            Self::RdfXml => "rdfxml",
            Self::RdfTurtle => "rdfturtle",
            Self::Ris => "ris",
            Self::SchemaOrgJson => "schemaorgjson",
            Self::TextCitation => "textcitation",
            Self::UnixrefXml => "unixrefxml",
            Self::UnixsdXml => "unixsdxml",
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bibtex => ".bib",
            Self::CiteprocJson => ".json",
            Self::RdfXml => ".rdf",
            Self::RdfTurtle => ".ttl",
            Self::Ris => ".ris",
            Self::SchemaOrgJson => ".jsonld",
            Self::TextCitation => ".txt",
            Self::UnixrefXml | Self::UnixsdXml => ".xml",
        }
    }

    /// Registry transform path appended to `works/{doi}/`.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Bibtex => "transform/application/x-bibtex",
            Self::CiteprocJson => "transform/application/vnd.citationstyles.csl+json",
            Self::RdfXml => "transform/application/rdf+xml",
            Self::RdfTurtle => "transform/text/turtle",
            Self::Ris => "transform/application/x-research-info-systems",
            Self::SchemaOrgJson => "transform/application/vnd.schemaorg.ld+json",
            Self::TextCitation => "transform/text/x-bibliography",
            Self::UnixrefXml => "transform/application/vnd.crossref.unixref+xml",
            Self::UnixsdXml => "transform/application/vnd.crossref.unixsd+xml",
        }
    }
}

impl fmt::Display for CitationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a format name not in [`CitationFormat::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown citation format '{name}' (expected one of: {})", valid_names())]
pub struct UnknownFormatError {
    /// The rejected name.
    pub name: String,
}

fn valid_names() -> String {
    CitationFormat::ALL
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for CitationFormat {
    type Err = UnknownFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownFormatError {
                name: wanted.to_string(),
            })
    }
}
