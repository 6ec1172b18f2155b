use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Lines of a text file, without line terminators.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {:?}", path))
}

/// One column of every record in a headerless CSV file.
pub fn read_csv_column(path: &Path, column: usize) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut values = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse {:?}", path))?;
        let value = record
            .get(column)
            .with_context(|| format!("Record {} has no column {}", line + 1, column))?;
        values.push(value.to_string());
    }
    Ok(values)
}

/// Appends to `path`, creating it first if needed.
pub fn append_text(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?} for appending", path))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to append to {:?}", path))
}

/// Replaces the contents of an existing file.
pub fn overwrite_text(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?} for writing", path))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Reads a whole file as UTF-8.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        fs::write(&path, "10.0.0.1\r\n10.0.0.2\n\nlast").unwrap();

        assert_eq!(read_lines(&path).unwrap(), vec!["10.0.0.1", "10.0.0.2", "", "last"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(read_lines(&dir.path().join("nope.txt")).is_err());
    }

    #[test]
    fn reads_csv_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        fs::write(&path, "alice,pw1,\"a, quoted\"\nbob,pw2,x\n").unwrap();

        assert_eq!(read_csv_column(&path, 0).unwrap(), vec!["alice", "bob"]);
        assert_eq!(read_csv_column(&path, 2).unwrap(), vec!["a, quoted", "x"]);
    }

    #[test]
    fn csv_short_row_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.csv");
        fs::write(&path, "a,b\nc\n").unwrap();

        let err = read_csv_column(&path, 1).unwrap_err();
        assert!(err.to_string().contains("Record 2"));
    }

    #[test]
    fn append_creates_then_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");

        append_text(&path, "one\n").unwrap();
        append_text(&path, "two\n").unwrap();
        assert_eq!(read_text(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn overwrite_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.txt");
        fs::write(&path, "a much longer previous value").unwrap();

        overwrite_text(&path, "short").unwrap();
        assert_eq!(read_text(&path).unwrap(), "short");
    }

    #[test]
    fn overwrite_requires_existing_file() {
        let dir = tempdir().unwrap();
        assert!(overwrite_text(&dir.path().join("absent.txt"), "x").is_err());
    }
}
