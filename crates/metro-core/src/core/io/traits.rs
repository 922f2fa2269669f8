use super::record::CoordinateRecord;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for plain-text particle coordinate formats.
///
/// Implementors handle format-specific parsing and serialization of
/// [`CoordinateRecord`]s; the path helpers wrap them in buffered file handles.
pub trait CoordinateFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads all particle records from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<CoordinateRecord>, Self::Error>;

    /// Writes one frame of particle records.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(records: &[CoordinateRecord], writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads particle records from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the file to read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<CoordinateRecord>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes particle records to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(records: &[CoordinateRecord], path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(records, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
