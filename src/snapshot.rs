use crate::canvas::Snapshot;
use crate::render::write_row;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn snapshot_file_name(unix_ms: u128) -> String {
    format!("glyphcam_{unix_ms}.ans")
}

/// Encodes `snap` row by row. `cat` on the result reproduces the picture.
pub fn encode_ansi(snap: &Snapshot, out: &mut dyn Write) -> std::io::Result<()> {
    let mut last_fg = None;
    for row in 0..snap.rows {
        out.write_all(b"\x1b[48;2;0;0;0m")?;
        write_row(out, snap.row(row), &mut last_fg)?;
        out.write_all(b"\x1b[0m\n")?;
        last_fg = None;
    }
    Ok(())
}

pub fn save_snapshot(snap: &Snapshot, dir: &Path) -> anyhow::Result<PathBuf> {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(snapshot_file_name(unix_ms));
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    encode_ansi(snap, &mut out).with_context(|| format!("write {}", path.display()))?;
    out.flush().with_context(|| format!("flush {}", path.display()))?;
    log::info!("snapshot: {}x{} cells -> {}", snap.cols, snap.rows, path.display());
    Ok(path)
}
