use super::record::CoordinateRecord;
use super::traits::CoordinateFile;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
    #[error("Header announces {expected} particles but the file contains {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("File is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("Invalid particle count '{0}'")]
    InvalidCount(String),
    #[error("Expected 8 columns (name index x y z charge weight radius), found {0}")]
    ColumnCount(usize),
    #[error("Invalid integer in column '{column}' (value: '{value}')")]
    InvalidInt { column: &'static str, value: String },
    #[error("Invalid float in column '{column}' (value: '{value}')")]
    InvalidFloat { column: &'static str, value: String },
}

const COLUMNS: [&str; 8] = ["name", "index", "x", "y", "z", "charge", "weight", "radius"];

/// The plain-text coordinate format: a particle count followed by one
/// `name index x y z charge weight radius` line per particle.
///
/// Blank lines and lines starting with `#` are ignored on reading.
pub struct AamFile;

fn parse_float(value: &str, column: &'static str, line: usize) -> Result<f64, AamError> {
    value.parse().map_err(|_| AamError::Parse {
        line,
        kind: ParseErrorKind::InvalidFloat {
            column,
            value: value.to_string(),
        },
    })
}

fn parse_record(content: &str, line: usize) -> Result<CoordinateRecord, AamError> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() != COLUMNS.len() {
        return Err(AamError::Parse {
            line,
            kind: ParseErrorKind::ColumnCount(fields.len()),
        });
    }
    let index = fields[1].parse().map_err(|_| AamError::Parse {
        line,
        kind: ParseErrorKind::InvalidInt {
            column: COLUMNS[1],
            value: fields[1].to_string(),
        },
    })?;
    let mut numbers = [0.0; 6];
    for (k, slot) in numbers.iter_mut().enumerate() {
        *slot = parse_float(fields[k + 2], COLUMNS[k + 2], line)?;
    }
    Ok(CoordinateRecord {
        name: fields[0].to_string(),
        index,
        position: Point3::new(numbers[0], numbers[1], numbers[2]),
        charge: numbers[3],
        weight: numbers[4],
        radius: numbers[5],
    })
}

impl CoordinateFile for AamFile {
    type Error = AamError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<CoordinateRecord>, Self::Error> {
        let mut expected: Option<usize> = None;
        let mut records = Vec::new();
        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let line_number = line_index + 1;
            match expected {
                None => {
                    let count = content.parse().map_err(|_| AamError::Parse {
                        line: line_number,
                        kind: ParseErrorKind::InvalidCount(content.to_string()),
                    })?;
                    records.reserve(count);
                    expected = Some(count);
                }
                Some(count) if records.len() < count => {
                    records.push(parse_record(content, line_number)?);
                }
                Some(_) => break,
            }
        }
        let expected = expected.ok_or(AamError::Empty)?;
        if records.len() != expected {
            return Err(AamError::CountMismatch {
                expected,
                found: records.len(),
            });
        }
        Ok(records)
    }

    fn write_to(records: &[CoordinateRecord], writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", records.len())?;
        for r in records {
            writeln!(
                writer,
                "{} {} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
                r.name, r.index, r.position.x, r.position.y, r.position.z, r.charge, r.weight, r.radius
            )?;
        }
        Ok(())
    }
}
