//! Scan summary wire types and writers.
//!
//! Field names follow the documented JSON surface (`inputFile`,
//! `filesScanned`, ...); YAML reuses the same names so the two formats
//! stay field-compatible.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::keywords::Hit;

/// One scanned leaf file and its hits. `file` is the path relative to the
/// scratch root with extraction-directory suffixes stripped, so it reads
/// as a logical path inside the input archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub file: String,
    pub hits: Vec<Hit>,
}

/// Aggregate counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub files_scanned: u64,
    /// Results with at least one hit.
    pub files_hit: u64,
    pub total_hits: u64,
    /// Wall-clock duration in seconds.
    pub duration: f64,
}

/// The complete output of one scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub input_file: String,
    pub results: Vec<ScanResult>,
    pub stats: ScanStats,
}

/// Output serialization format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(Error::Config(format!(
                "unknown output format {other:?} (expected json or yaml)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Sink for a finished summary.
pub trait SummaryWriter {
    fn write_summary(&mut self, summary: &ScanSummary) -> Result<(), Error>;
}

/// Pretty-printed JSON, one document.
pub struct JsonSummaryWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonSummaryWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonSummaryWriter { writer }
    }
}

impl<W: Write> SummaryWriter for JsonSummaryWriter<W> {
    fn write_summary(&mut self, summary: &ScanSummary) -> Result<(), Error> {
        serde_json::to_writer_pretty(&mut self.writer, summary)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// YAML, one document.
pub struct YamlSummaryWriter<W: Write> {
    writer: W,
}

impl<W: Write> YamlSummaryWriter<W> {
    pub fn new(writer: W) -> Self {
        YamlSummaryWriter { writer }
    }
}

impl<W: Write> SummaryWriter for YamlSummaryWriter<W> {
    fn write_summary(&mut self, summary: &ScanSummary) -> Result<(), Error> {
        serde_yaml::to_writer(&mut self.writer, summary)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Writer for the requested format over any byte sink.
pub fn summary_writer(
    format: OutputFormat,
    writer: Box<dyn Write>,
) -> Box<dyn SummaryWriter> {
    match format {
        OutputFormat::Json => Box::new(JsonSummaryWriter::new(writer)),
        OutputFormat::Yaml => Box::new(YamlSummaryWriter::new(writer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> ScanSummary {
        ScanSummary {
            input_file: "pkg.tar".to_string(),
            results: vec![ScanResult {
                file: "pkg.tar/inner.txt".to_string(),
                hits: vec![Hit {
                    word: "secret".to_string(),
                    index: 12,
                    context: "a secret b".to_string(),
                    policies: BTreeMap::from([("p1".to_string(), "desc".to_string())]),
                }],
            }],
            stats: ScanStats {
                files_scanned: 3,
                files_hit: 1,
                total_hits: 1,
                duration: 0.25,
            },
        }
    }

    #[test]
    fn json_uses_documented_field_names() {
        let mut buf = Vec::new();
        JsonSummaryWriter::new(&mut buf)
            .write_summary(&sample())
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        for field in [
            "\"inputFile\"",
            "\"results\"",
            "\"file\"",
            "\"hits\"",
            "\"word\"",
            "\"index\"",
            "\"context\"",
            "\"policies\"",
            "\"filesScanned\"",
            "\"filesHit\"",
            "\"totalHits\"",
            "\"duration\"",
        ] {
            assert!(text.contains(field), "missing {field} in {text}");
        }
    }

    #[test]
    fn json_round_trips() {
        let mut buf = Vec::new();
        JsonSummaryWriter::new(&mut buf)
            .write_summary(&sample())
            .unwrap();
        let parsed: ScanSummary = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn yaml_round_trips() {
        let mut buf = Vec::new();
        YamlSummaryWriter::new(&mut buf)
            .write_summary(&sample())
            .unwrap();
        let parsed: ScanSummary = serde_yaml::from_slice(&buf).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
