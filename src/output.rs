use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::Record;
use crate::error::ResolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Writes one `key,externalId,displayName` line per record, replacing
/// `dest` atomically.
pub fn write_records(dest: &Utf8Path, records: &[Record]) -> Result<(), ResolverError> {
    let write_err = |message: String| ResolverError::OutputWrite {
        path: dest.to_string(),
        message,
    };

    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| write_err(err.to_string()))?;

    let mut temp = tempfile::Builder::new()
        .prefix("acc-resolve")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| write_err(err.to_string()))?;
    {
        let mut writer = io::BufWriter::new(temp.as_file_mut());
        for record in records {
            writeln!(writer, "{}", record.to_csv_line()).map_err(|err| write_err(err.to_string()))?;
        }
        writer.flush().map_err(|err| write_err(err.to_string()))?;
    }
    temp.persist(dest.as_std_path())
        .map_err(|err| write_err(err.to_string()))?;
    Ok(())
}

/// Destinations that would be overwritten.
pub fn existing_outputs<'a>(paths: &[&'a Utf8Path]) -> Vec<&'a Utf8Path> {
    paths
        .iter()
        .copied()
        .filter(|path| path.as_std_path().exists())
        .collect()
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
