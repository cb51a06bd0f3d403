use std::fs::File;
use std::io;
use std::path::Path;

use nalgebra::DVector;
use tracing::debug;

/// One filtering step as seen by the outputs
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub measurement: DVector<f64>,
    pub filtered: DVector<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("record has {actual} channels, output was set up for {expected}")]
    Width { expected: usize, actual: usize },
}

/// Trait for output handlers
pub trait OutputHandler {
    /// Handle one filtered step
    fn handle_step(&mut self, record: &StepRecord) -> Result<(), OutputError>;

    /// Flush anything buffered
    fn finish(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// CSV format output
///
/// Columns are `Measured_<label>` for every channel followed by `Filtered_<label>`.
pub struct CsvOutput<W: io::Write> {
    writer: csv::Writer<W>,
    labels: Vec<String>,
    header_written: bool,
}

impl CsvOutput<File> {
    /// Create (or truncate) a CSV file
    pub fn create<P: AsRef<Path>>(path: P, labels: &[&str]) -> Result<Self, OutputError> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file, labels))
    }
}

impl<W: io::Write> CsvOutput<W> {
    /// Wrap any writer. With no labels the channels are numbered from 0.
    pub fn from_writer(writer: W, labels: &[&str]) -> Self {
        CsvOutput {
            writer: csv::Writer::from_writer(writer),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            header_written: false,
        }
    }

    fn write_header(&mut self) -> Result<(), OutputError> {
        let header: Vec<String> = ["Measured", "Filtered"]
            .iter()
            .flat_map(|kind| self.labels.iter().map(move |l| format!("{kind}_{l}")))
            .collect();
        self.writer.write_record(&header)?;
        self.header_written = true;
        Ok(())
    }

    /// Consume the output and return the inner writer
    pub fn into_inner(self) -> Result<W, OutputError> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: io::Write> OutputHandler for CsvOutput<W> {
    fn handle_step(&mut self, record: &StepRecord) -> Result<(), OutputError> {
        let width = record.measurement.len();
        if record.filtered.len() != width {
            return Err(OutputError::Width { expected: width, actual: record.filtered.len() });
        }
        if self.labels.is_empty() {
            self.labels = (0..width).map(|i| i.to_string()).collect();
        }
        if width != self.labels.len() {
            return Err(OutputError::Width { expected: self.labels.len(), actual: width });
        }
        if !self.header_written {
            self.write_header()?;
        }

        let row: Vec<String> = record
            .measurement
            .iter()
            .chain(record.filtered.iter())
            .map(|v| format!("{:.8}", v))
            .collect();
        self.writer.write_record(&row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs every step at DEBUG level
#[derive(Debug, Default)]
pub struct LogOutput;

impl OutputHandler for LogOutput {
    fn handle_step(&mut self, record: &StepRecord) -> Result<(), OutputError> {
        debug!(
            step = record.step,
            measurement = ?record.measurement.as_slice(),
            filtered = ?record.filtered.as_slice(),
            "Filtered step"
        );
        Ok(())
    }
}
