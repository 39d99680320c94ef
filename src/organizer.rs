//! Deterministic output layout and the two-phase file move.
//!
//! `plan_relocation` publishes the target path on the record before anything
//! touches the filesystem; `commit_relocation` performs the move. A failed
//! commit does not roll the published path back, so downstream steps may see
//! a location that does not exist yet.

use crate::common::constants::{PATH_SUBSTITUTE, RESERVED_PATH_CHARS, UNKNOWN_ACTOR};
use crate::common::error::{Result, ScraperError};
use crate::common::types::MediaRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Replace every reserved path character and trim surrounding whitespace
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if RESERVED_PATH_CHARS.contains(&c) {
                PATH_SUBSTITUTE
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `<output_root>/<actor>/<identifier>`, with the placeholder actor when none
/// is known or the name sanitizes to nothing.
pub fn compute_target_dir(output_root: &Path, actor: Option<&str>, identifier: &str) -> PathBuf {
    let actor = actor
        .map(sanitize_component)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ACTOR.to_string());
    output_root.join(actor).join(sanitize_component(identifier))
}

/// A relocation whose target is already published on `record.file_location`
#[derive(Debug, Clone)]
pub struct PlannedRelocation {
    pub record: MediaRecord,
    pub source: PathBuf,
}

impl PlannedRelocation {
    pub fn target(&self) -> &Path {
        self.record
            .file_location
            .as_deref()
            .unwrap_or(self.source.as_path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationOutcome {
    Moved,
    AlreadyInPlace,
}

pub struct FileOrganizer {
    output_root: PathBuf,
}

impl FileOrganizer {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    pub fn target_dir(&self, record: &MediaRecord) -> PathBuf {
        compute_target_dir(
            &self.output_root,
            record.metadata.primary_actor(),
            &record.identifier,
        )
    }

    /// Publish phase: set the record's location to the final path.
    pub fn plan_relocation(&self, mut record: MediaRecord) -> Result<PlannedRelocation> {
        let target_dir = self.target_dir(&record);
        let Some(source) = record.file_location.clone() else {
            return Err(ScraperError::Relocation {
                from: PathBuf::new(),
                to: target_dir,
                message: format!("{} has no file location", record.identifier),
            });
        };
        let Some(file_name) = source.file_name() else {
            return Err(ScraperError::Relocation {
                from: source.clone(),
                to: target_dir,
                message: "source path has no file name".to_string(),
            });
        };

        let target = target_dir.join(file_name);
        debug!("Planned {} -> {}", source.display(), target.display());
        record.file_location = Some(target);
        Ok(PlannedRelocation { record, source })
    }

    /// Execute phase: move the file to the published path.
    pub fn commit_relocation(&self, planned: &PlannedRelocation) -> Result<RelocationOutcome> {
        let source = planned.source.as_path();
        let target = planned.target();

        if same_location(source, target) {
            info!("{} is already in place", target.display());
            return Ok(RelocationOutcome::AlreadyInPlace);
        }

        let fail = |message: String| ScraperError::Relocation {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            message,
        };

        if !source.exists() {
            return Err(fail("source file does not exist".to_string()));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        move_file(source, target).map_err(|e| fail(e.to_string()))?;

        info!("Moved {} -> {}", source.display(), target.display());
        Ok(RelocationOutcome::Moved)
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Rename, falling back to copy + remove when the target is on another device
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dst)?;
    std::fs::remove_file(src)
}
