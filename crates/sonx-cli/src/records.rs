//! 📂 Records off disk: NDJSON in, `Vec<Record>` out.
//!
//! One `{"object": "...", "text": "..."}` per line. Blank lines are skipped.
//! A path ending in `.gz` is gunzipped first, because record dumps are big and
//! bytes are squishy. 🫁

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use memchr::memchr_iter;
use sonx::Record;

/// 📄 Read every record in `path`. The first malformed line fails the whole load.
pub(crate) fn read_records(path: &Path) -> Result<Vec<Record>> {
    let raw = std::fs::read(path).with_context(|| {
        format!(
            "💀 The door to '{}' would not budge. It might not exist, or the permissions might be wrong.",
            path.display()
        )
    })?;

    let bytes = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut inflated = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .with_context(|| format!("💀 '{}' says it's gzip. It lied.", path.display()))?;
        inflated
    } else {
        raw
    };

    parse_ndjson(&bytes)
}

/// 🔍 Split on `\n`, tolerate `\r\n`, skip blanks, deserialize the rest.
pub(crate) fn parse_ndjson(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut start = 0;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for (line_no, end) in ends.enumerate() {
        let line = trim_line(&bytes[start..end]);
        start = end + 1;
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_slice(line)
            .with_context(|| format!("💀 line {} is not a record", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line.trim_ascii()
}
