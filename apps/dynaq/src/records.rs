//! Record files: JSON arrays and JSON lines of DynamoDB-JSON items.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use dynaq_model::Item;

/// Read records from a JSON array or JSON-lines file.
///
/// The format is picked from the first non-whitespace character: `[` means
/// an array, anything else one item per line. Blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&content).with_context(|| format!("invalid records in {}", path.display()))
}

/// Parse records from text; see [`read_records`].
pub fn parse_records(content: &str) -> Result<Vec<Item>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", n + 1))
        })
        .collect()
}

/// Write one record as a JSON line.
pub fn write_line<W: Write>(out: &mut W, item: &Item) -> Result<()> {
    serde_json::to_writer(&mut *out, item)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Streams records into a JSON array without buffering them.
#[derive(Debug)]
pub struct ArrayWriter<W: Write> {
    out: W,
    count: usize,
}

impl<W: Write> ArrayWriter<W> {
    /// Start an array on `out`.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(b"[")?;
        Ok(Self { out, count: 0 })
    }

    /// Append one record.
    pub fn push(&mut self, item: &Item) -> Result<()> {
        self.out
            .write_all(if self.count == 0 { b"\n  " } else { b",\n  " })?;
        serde_json::to_writer(&mut self.out, item)?;
        self.count += 1;
        Ok(())
    }

    /// Close the array and flush. Returns the number of records written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.out
            .write_all(if self.count == 0 { b"]\n" } else { b"\n]\n" })?;
        self.out.flush()?;
        Ok(self.count)
    }
}
