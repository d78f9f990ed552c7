use csv::{ReaderBuilder, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::report::EntityCounts;
use super::scanner::{CellScanner, ScanError};
use super::PipelineError;

const UTF8_BOM: char = '\u{feff}';
const ROW_BUFFER_BYTES: usize = 1024;

/// Line terminator written between output records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
}

impl LineEnding {
    fn terminator(self) -> Terminator {
        match self {
            LineEnding::Lf => Terminator::Any(b'\n'),
            LineEnding::Crlf => Terminator::CRLF,
        }
    }

    fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::Crlf => b"\r\n",
        }
    }
}

/// Splits CSV text into physical records
///
/// A blank line comes back as an empty slice. Terminators (`\n`, `\r\n` or a
/// lone `\r`) inside a quoted field do not end the record. Quoting follows
/// the csv reader: a quote only opens a quoted field at the start of a field.
fn record_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quotes {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else {
            match b {
                b'"' if field_start => {
                    in_quotes = true;
                    field_start = false;
                }
                b',' => field_start = true,
                b'\r' | b'\n' => {
                    lines.push(&text[start..i]);
                    if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    start = i + 1;
                    field_start = true;
                }
                _ => field_start = false,
            }
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Walks a CSV grid row by row and cell by cell
///
/// Row 0 is the header and is written back untouched, as is a leading byte
/// order mark. Blank lines are rows without cells and are written back as
/// blank lines. In every other row a cell that is empty after trimming is
/// copied as-is, anything else goes through the scanner. Processing stops at
/// the first failing cell.
pub struct GridProcessor<'a> {
    scanner: CellScanner<'a>,
    line_ending: LineEnding,
}

impl<'a> GridProcessor<'a> {
    pub fn new(scanner: CellScanner<'a>, line_ending: LineEnding) -> Self {
        Self {
            scanner,
            line_ending,
        }
    }

    pub fn process(&self, csv_text: &str) -> Result<(String, EntityCounts), PipelineError> {
        let (body, bom) = match csv_text.strip_prefix(UTF8_BOM) {
            Some(rest) => (rest, true),
            None => (csv_text, false),
        };

        let mut output = Vec::with_capacity(csv_text.len());
        if bom {
            let mut buf = [0u8; 4];
            output.extend_from_slice(UTF8_BOM.encode_utf8(&mut buf).as_bytes());
        }

        // The reader skips blank lines; `record_lines` says where they were.
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());
        let mut records = reader.records();
        let mut builder = WriterBuilder::new();
        builder
            .flexible(true)
            .terminator(self.line_ending.terminator())
            .buffer_capacity(ROW_BUFFER_BYTES);

        let lines = record_lines(body);
        let mut counts = EntityCounts::new();
        let mut scanned = 0usize;

        for (row, line) in lines.iter().enumerate() {
            if line.is_empty() {
                trace!("Row {} is blank", row);
                output.extend_from_slice(self.line_ending.as_bytes());
                continue;
            }

            let record = match records.next() {
                Some(result) => result.map_err(|e| {
                    PipelineError::MalformedInput(format!("failed to parse CSV row {}: {}", row + 1, e))
                })?,
                None => return Err(record_mismatch(row)),
            };

            if row == 0 {
                trace!("Passing header through ({} columns)", record.len());
                write_row(&builder, &mut output, &record)?;
                continue;
            }

            let mut cells = Vec::with_capacity(record.len());
            for (column, cell) in record.iter().enumerate() {
                if cell.trim().is_empty() {
                    cells.push(cell.to_string());
                    continue;
                }

                let outcome = self
                    .scanner
                    .scan(cell)
                    .map_err(|e| cell_error(e, row, column))?;
                scanned += 1;

                if !outcome.entity_types.is_empty() {
                    trace!(
                        "Row {} column {}: {} entities",
                        row,
                        column,
                        outcome.entity_types.len()
                    );
                }
                for entity_type in &outcome.entity_types {
                    counts.increment(entity_type);
                }
                cells.push(outcome.masked);
            }
            write_row(&builder, &mut output, &cells)?;
        }

        if records.next().is_some() {
            return Err(record_mismatch(lines.len()));
        }
        if lines.is_empty() {
            return Err(PipelineError::MalformedInput(
                "input contains no rows; a header row is required".to_string(),
            ));
        }

        let text = String::from_utf8(output)
            .map_err(|e| PipelineError::Internal(format!("CSV output is not UTF-8: {}", e)))?;

        debug!(
            "Grid processed: {} rows, {} cells scanned, {} entities",
            lines.len(),
            scanned,
            counts.total()
        );
        Ok((text, counts))
    }
}

fn record_mismatch(row: usize) -> PipelineError {
    PipelineError::MalformedInput(format!("could not determine record boundaries near row {}", row + 1))
}

/// Appends one record to `output`. An empty record would be written as `""`,
/// so blank rows never come through here.
fn write_row<I, T>(builder: &WriterBuilder, output: &mut Vec<u8>, record: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = builder.from_writer(output);
    writer.write_record(record).map_err(write_error)?;
    writer.flush().map_err(|e| write_error(e.into()))
}

fn write_error(e: csv::Error) -> PipelineError {
    PipelineError::Internal(format!("failed to write CSV output: {}", e))
}

fn cell_error(error: ScanError, row: usize, column: usize) -> PipelineError {
    match error {
        ScanError::Detection(source) => PipelineError::Detection { row, column, source },
        ScanError::Masking(source) => PipelineError::Masking { row, column, source },
    }
}
