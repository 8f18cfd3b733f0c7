//! Transcript naming and persistence, plus the turn-count estimate.

use std::path::{Path, PathBuf};

/// Lower-case `name`, collapse every run of non-alphanumeric characters into
/// one hyphen and trim hyphens from both ends. A name with nothing left
/// becomes `"unnamed"`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

const TURN_MARKERS: &[&str] = &["> ", "user:", "assistant:", "human:", "[turn"];

/// Estimate the number of conversational turns in agent output.
///
/// This is an approximation: it counts lines starting with a prompt or
/// speaker marker (`> `, `User:`, `Assistant:`, `Human:`, `[turn`). Any
/// non-empty output counts as at least one turn; empty or missing output
/// is zero.
pub fn count_turns(output: Option<&str>) -> u32 {
    let Some(output) = output.filter(|o| !o.trim().is_empty()) else {
        return 0;
    };
    let markers = output
        .lines()
        .filter(|line| {
            let lower = line.trim_start().to_ascii_lowercase();
            TURN_MARKERS.iter().any(|m| lower.starts_with(m))
        })
        .count();
    u32::try_from(markers).unwrap_or(u32::MAX).max(1)
}

/// Write `output` to `<dir>/<sanitized name>.txt`, creating `dir`.
pub fn save_transcript(dir: &Path, use_case_name: &str, output: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.txt", sanitize_filename(use_case_name)));
    std::fs::write(&path, output)?;
    Ok(path)
}
