//! Atomic JSON artifact writes.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ExtractionError;

/// Serialize `value` as pretty JSON to `dir/name`.
///
/// The JSON is written to a temp file in `dir` and renamed over the final
/// path, so `dir/name` holds either the previous content or the complete new
/// artifact. On error the temp file is removed.
pub fn write_json_atomic<T: Serialize>(
    dir: &Path,
    name: &str,
    value: &T,
) -> Result<PathBuf, ExtractionError> {
    std::fs::create_dir_all(dir)?;
    let tmp = tempfile::Builder::new()
        .prefix(".artifact-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let path = dir.join(name);
    tmp.persist(&path)?;
    Ok(path)
}
