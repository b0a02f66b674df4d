use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use walkdir::WalkDir;

/// One backfillable transcript on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredSession {
    pub session_id: String,
    /// Stable identifier of the project directory the transcript lives in;
    /// becomes the workspace canonical ID for backfilled sessions.
    pub project_key: String,
    pub transcript_path: PathBuf,
    pub file_size_bytes: u64,
    pub modified_at: SystemTime,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SkippedCounts {
    pub subagents: usize,
    pub active: usize,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub discovered: Vec<DiscoveredSession>,
    pub skipped: SkippedCounts,
    pub errors: Vec<String>,
}

/// Enumerate `*.jsonl` transcripts under `projects_root`. Subagent sidecar
/// files (`agent-*.jsonl`) are not sessions, and files younger than
/// `skip_active_threshold_ms` probably belong to a live session that will
/// arrive through normal ingestion.
pub fn scan_for_sessions(projects_root: &Path, skip_active_threshold_ms: u64) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let now = SystemTime::now();
    let threshold = Duration::from_millis(skip_active_threshold_ms);

    for entry in WalkDir::new(projects_root).min_depth(2).max_depth(2) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".jsonl") {
            continue;
        }
        if name.starts_with("agent-") {
            report.skipped.subagents += 1;
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                report
                    .errors
                    .push(format!("{}: {}", entry.path().display(), e));
                continue;
            }
        };
        let modified_at = metadata.modified().unwrap_or(now);
        if now
            .duration_since(modified_at)
            .map(|age| age < threshold)
            .unwrap_or(true)
        {
            report.skipped.active += 1;
            continue;
        }

        let session_id = name.trim_end_matches(".jsonl").to_string();
        let project_key = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown-project".to_string());

        report.discovered.push(DiscoveredSession {
            session_id,
            project_key,
            transcript_path: entry.path().to_path_buf(),
            file_size_bytes: metadata.len(),
            modified_at,
        });
    }

    report
        .discovered
        .sort_by(|a, b| a.transcript_path.cmp(&b.transcript_path));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;

    fn old_mtime() -> FileTime {
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        FileTime::from_system_time(hour_ago)
    }

    #[test]
    fn test_scan_discovers_and_classifies() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("-home-dev-widgets");
        fs::create_dir_all(&project).unwrap();

        let session = project.join("cc-session-1.jsonl");
        fs::write(&session, "{}\n").unwrap();
        set_file_mtime(&session, old_mtime()).unwrap();

        let subagent = project.join("agent-abc123.jsonl");
        fs::write(&subagent, "{}\n").unwrap();
        set_file_mtime(&subagent, old_mtime()).unwrap();

        // Freshly written: still active.
        let live = project.join("cc-session-2.jsonl");
        fs::write(&live, "{}\n").unwrap();

        // Not a transcript.
        fs::write(project.join("notes.txt"), "hi").unwrap();

        let report = scan_for_sessions(root.path(), 300_000).unwrap();
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(report.discovered[0].session_id, "cc-session-1");
        assert_eq!(report.discovered[0].project_key, "-home-dev-widgets");
        assert_eq!(report.skipped.subagents, 1);
        assert_eq!(report.skipped.active, 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_scan_empty_root() {
        let root = tempfile::tempdir().unwrap();
        let report = scan_for_sessions(root.path(), 300_000).unwrap();
        assert!(report.discovered.is_empty());
        assert_eq!(report.skipped.subagents, 0);
        assert_eq!(report.skipped.active, 0);
    }

    #[test]
    fn test_scan_ignores_top_level_files() {
        let root = tempfile::tempdir().unwrap();
        // A jsonl directly in the root is not inside a project directory.
        let stray = root.path().join("stray.jsonl");
        fs::write(&stray, "{}\n").unwrap();
        set_file_mtime(&stray, old_mtime()).unwrap();

        let report = scan_for_sessions(root.path(), 300_000).unwrap();
        assert!(report.discovered.is_empty());
    }
}
