#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use blake3::Hasher;
use cable_core::StepIndex;
use cable_solver::History;
use thiserror::Error;
use tracing::info;

const HISTORY_DIGEST_DOMAIN: &str = "CABLE:HISTORY";

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    InvalidFormat { line: usize, message: String },
    #[error("line {line} has {got} columns, expected {expected}")]
    ColumnMismatch {
        line: usize,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Prefix each row with its step index and end time.
    pub index_columns: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            index_columns: false,
        }
    }
}

/// Delimited table read back from disk; `steps` and `times` are present only
/// for tables written with index columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialTable {
    pub steps: Vec<StepIndex>,
    pub times: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

pub fn write_csv(
    path: impl AsRef<Path>,
    history: &History,
    options: CsvOptions,
) -> Result<(), TraceError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_delimited(&mut writer, history, options)?;
    writer.flush()?;
    info!(path = %path.display(), rows = history.len(), "wrote potential table");
    Ok(())
}

pub fn write_delimited<W: Write>(
    writer: &mut W,
    history: &History,
    options: CsvOptions,
) -> Result<(), TraceError> {
    let delimiter = options.delimiter as char;
    for (index, (step, row)) in history.rows().enumerate() {
        let mut line = String::with_capacity(row.len() * 12);
        if options.index_columns {
            let time = history.time_of(index).unwrap_or_default();
            line.push_str(&format!("{}{delimiter}{time}", step.0));
        }
        for (column, value) in row.iter().enumerate() {
            if column > 0 || options.index_columns {
                line.push(delimiter);
            }
            line.push_str(&format!("{value:e}"));
        }
        line.push('\n');
        writer.write_all(line.as_bytes())?;
    }
    Ok(())
}

pub fn read_csv(path: impl AsRef<Path>, options: CsvOptions) -> Result<PotentialTable, TraceError> {
    let file = File::open(path)?;
    read_delimited(BufReader::new(file), options)
}

pub fn read_delimited<R: Read>(
    reader: BufReader<R>,
    options: CsvOptions,
) -> Result<PotentialTable, TraceError> {
    let delimiter = options.delimiter as char;
    let mut table = PotentialTable {
        steps: Vec::new(),
        times: Vec::new(),
        rows: Vec::new(),
    };
    let mut width = None;

    for (offset, line) in reader.lines().enumerate() {
        let line_number = offset + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(delimiter).map(str::trim);
        if options.index_columns {
            let step = fields
                .next()
                .and_then(|field| field.parse::<u32>().ok())
                .ok_or_else(|| TraceError::InvalidFormat {
                    line: line_number,
                    message: "missing step index".to_string(),
                })?;
            let time = fields
                .next()
                .and_then(|field| field.parse::<f64>().ok())
                .ok_or_else(|| TraceError::InvalidFormat {
                    line: line_number,
                    message: "missing step time".to_string(),
                })?;
            table.steps.push(StepIndex(step));
            table.times.push(time);
        }
        let row = fields
            .map(|field| {
                field.parse::<f64>().map_err(|err| TraceError::InvalidFormat {
                    line: line_number,
                    message: format!("bad value {field:?}: {err}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let expected = *width.get_or_insert(row.len());
        if row.len() != expected {
            return Err(TraceError::ColumnMismatch {
                line: line_number,
                expected,
                got: row.len(),
            });
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// One renderable frame: `values[i]` is the potential at position `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame<'a> {
    pub step: StepIndex,
    pub t_ms: f64,
    pub values: &'a [f64],
}

/// Every `every`-th stored row, oldest first.
pub fn frames(history: &History, every: usize) -> impl Iterator<Item = Frame<'_>> + '_ {
    let every = every.max(1);
    history
        .rows()
        .enumerate()
        .step_by(every)
        .map(move |(index, (step, values))| Frame {
            step,
            t_ms: history.time_of(index).unwrap_or_default(),
            values,
        })
}

pub fn digest_history(history: &History) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(HISTORY_DIGEST_DOMAIN.as_bytes());
    hasher.update(&(history.positions() as u64).to_le_bytes());
    hasher.update(&(history.len() as u64).to_le_bytes());
    for (step, row) in history.rows() {
        hasher.update(&step.0.to_le_bytes());
        for value in row {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    *hasher.finalize().as_bytes()
}
