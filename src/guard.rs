//! Durable state guard for persisted JSON artifacts.
//!
//! Reads are quarantined here: a missing, empty, unparseable or
//! conflict-marked file never propagates an error, the caller gets a
//! well-typed default instead. Writes go through a temp file and a rename
//! so a crash mid-write leaves the previous artifact intact.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const OURS_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SPLIT_MARKER: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Ours,
    Base,
    Theirs,
}

/// Strip version-control conflict markers from `text`.
///
/// For every conflict hunk the "ours" side (and a diff3 base section, if
/// any) is dropped and the incoming side kept, so fields from both sides are
/// never mixed. Returns `None` when the text has no conflict markers.
///
/// This is a best-effort repair: the kept side is not validated against the
/// dropped one and real history on the dropped side is lost.
pub fn repair_conflicts(text: &str) -> Option<String> {
    let mut section = Section::Outside;
    let mut found = false;
    let mut kept = Vec::new();

    for line in text.lines() {
        let marker = line.trim_end();
        if marker.starts_with(OURS_MARKER) {
            section = Section::Ours;
            found = true;
            continue;
        }
        if section != Section::Outside {
            if marker.starts_with(BASE_MARKER) && section == Section::Ours {
                section = Section::Base;
                continue;
            }
            if marker == SPLIT_MARKER && section != Section::Theirs {
                section = Section::Theirs;
                continue;
            }
            if marker.starts_with(THEIRS_MARKER) {
                section = Section::Outside;
                continue;
            }
        }
        match section {
            Section::Outside | Section::Theirs => kept.push(line),
            Section::Ours | Section::Base => {}
        }
    }

    if found {
        Some(kept.join("\n"))
    } else {
        None
    }
}

/// Load a JSON artifact, falling back to `default` on any problem.
pub fn load_or_default<T: DeserializeOwned>(path: impl AsRef<Path>, default: T) -> T {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "artifact absent, starting from default");
        return default;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact unreadable, using default");
            return default;
        }
    };

    let text = match repair_conflicts(&raw) {
        Some(repaired) => {
            warn!(
                path = %path.display(),
                "artifact contained conflict markers; kept the incoming side, the other side was dropped"
            );
            repaired
        }
        None => raw,
    };

    if text.trim().is_empty() {
        warn!(path = %path.display(), "artifact empty, using default");
        return default;
    }

    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact is not valid JSON, using default");
            default
        }
    }
}

/// Write `value` as pretty JSON, replacing `path` atomically.
pub fn write_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let encoded = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&encoded)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = encoded.len(), "artifact written");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
