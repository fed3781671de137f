//! Pipeline host writing records to stdout and errors to stderr.

use std::io::{self, BufWriter, Stderr, Stdout, Write};

use clap::ValueEnum;
use fanrun_core::{ErrorRecord, ErrorSource, Pipeline, PipelineError};
use serde_json::json;

use crate::resolve::AddressRecord;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Writes address records to `out` and error records to `err`.
pub struct WriterPipeline<O: Write, E: Write> {
    format: OutputFormat,
    out: O,
    err: E,
    header_written: bool,
}

impl WriterPipeline<BufWriter<Stdout>, Stderr> {
    /// Pipeline over the process's stdout and stderr.
    pub fn stdio(format: OutputFormat) -> Self {
        Self::new(format, BufWriter::new(io::stdout()), io::stderr())
    }
}

impl<O: Write, E: Write> WriterPipeline<O, E> {
    pub fn new(format: OutputFormat, out: O, err: E) -> Self {
        Self {
            format,
            out,
            err,
            header_written: false,
        }
    }

    /// Flush buffered output.
    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.out.flush().map_err(map_io)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> Pipeline for WriterPipeline<O, E> {
    type Object = AddressRecord;
    type Input = String;

    fn write_object(&mut self, record: AddressRecord) -> Result<(), PipelineError> {
        match self.format {
            OutputFormat::Text => {
                if !self.header_written {
                    writeln!(self.out, "{:<32}  {:<40}  {:<6}  {}", "HOST", "ADDRESS", "PORT", "FAMILY")
                        .map_err(map_io)?;
                    writeln!(self.out, "{}", "-".repeat(90)).map_err(map_io)?;
                    self.header_written = true;
                }
                writeln!(
                    self.out,
                    "{:<32}  {:<40}  {:<6}  {}",
                    record.host, record.address, record.port, record.family
                )
                .map_err(map_io)
            }
            OutputFormat::Json => {
                let line = serde_json::to_string(&record)
                    .map_err(|e| PipelineError::Write(e.to_string()))?;
                writeln!(self.out, "{}", line).map_err(map_io)
            }
        }
    }

    fn write_error(&mut self, record: ErrorRecord<String>) -> Result<(), PipelineError> {
        let target = match &record.source {
            ErrorSource::Unit { input: Some(host), .. } => host.clone(),
            ErrorSource::Unit { input: None, .. } => crate::resolve::LOCAL_HOST.to_string(),
            ErrorSource::Invocation => format!("invocation {}", record.invocation_id),
        };

        // Keep errors ordered after the results already written.
        self.out.flush().map_err(map_io)?;

        match self.format {
            OutputFormat::Text => writeln!(
                self.err,
                "error[{}]: {}: {}",
                record.category, target, record.message
            )
            .map_err(map_io),
            OutputFormat::Json => {
                let line = json!({
                    "error": record,
                    "target": target,
                });
                writeln!(self.err, "{}", line).map_err(map_io)
            }
        }
    }
}

fn map_io(e: io::Error) -> PipelineError {
    if e.kind() == io::ErrorKind::BrokenPipe {
        PipelineError::Closed
    } else {
        PipelineError::Write(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanrun_core::InvocationId;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup timed out")]
    struct Timeout;

    fn record(host: &str) -> AddressRecord {
        AddressRecord {
            host: host.to_string(),
            address: "10.1.2.3".parse().unwrap(),
            port: 443,
            family: "IPv4",
        }
    }

    fn pipeline(format: OutputFormat) -> WriterPipeline<Vec<u8>, Vec<u8>> {
        WriterPipeline::new(format, Vec::new(), Vec::new())
    }

    #[test]
    fn test_text_output_writes_header_once() {
        let mut p = pipeline(OutputFormat::Text);
        p.write_object(record("a")).unwrap();
        p.write_object(record("b")).unwrap();

        let (out, _) = p.into_inner();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("HOST"));
        assert!(lines[2].starts_with("a "));
        assert!(lines[3].contains("10.1.2.3"));
    }

    #[test]
    fn test_json_output() {
        let mut p = pipeline(OutputFormat::Json);
        p.write_object(record("a")).unwrap();

        let (out, _) = p.into_inner();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["host"], "a");
        assert_eq!(value["address"], "10.1.2.3");
        assert_eq!(value["port"], 443);
    }

    #[test]
    fn test_error_goes_to_stderr() {
        let mut p = pipeline(OutputFormat::Text);
        let error = ErrorRecord::unit(InvocationId::generate(), 0, Some("slow".to_string()), Timeout);
        p.write_error(error).unwrap();

        let (out, err) = p.into_inner();
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "error[Timeout]: slow: lookup timed out\n"
        );
    }

    #[test]
    fn test_broken_pipe_is_closed() {
        let error = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(map_io(error), PipelineError::Closed);

        let error = io::Error::new(io::ErrorKind::Other, "disk");
        assert!(matches!(map_io(error), PipelineError::Write(_)));
    }
}
