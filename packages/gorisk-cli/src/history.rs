//! Snapshot history store
//!
//! `.gorisk-history.json` in the project root: one snapshot per recorded
//! invocation, capped at 100, written with `0600` permissions.

use chrono::{DateTime, Utc};
use gorisk_ir::pipeline::AnalysisReport;
use gorisk_ir::{GoriskError, Result, RiskLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = ".gorisk-history.json";
const MAX_SNAPSHOTS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotModule {
    pub path: String,
    pub version: String,
    pub risk_level: RiskLevel,
    pub effective_score: f64,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub modules: Vec<SnapshotModule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStore {
    pub snapshots: Vec<Snapshot>,
}

impl Snapshot {
    /// Capture the module rows of a finished analysis.
    pub fn from_report(report: &AnalysisReport, commit: Option<String>) -> Snapshot {
        let mut modules: Vec<SnapshotModule> = report
            .modules
            .iter()
            .map(|m| SnapshotModule {
                path: m.module.clone(),
                version: m.version.clone(),
                risk_level: m.risk_level,
                effective_score: m.effective_score,
                capabilities: m.capabilities.clone(),
            })
            .collect();
        modules.sort_by(|a, b| a.path.cmp(&b.path));
        Snapshot {
            timestamp: Utc::now(),
            commit,
            modules,
        }
    }
}

impl HistoryStore {
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(HISTORY_FILE)
    }

    pub fn load(project_dir: &Path) -> Result<HistoryStore> {
        let path = Self::path_for(project_dir);
        if !path.is_file() {
            return Ok(HistoryStore::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| GoriskError::analysis(format!("corrupt history file: {e}")))
    }

    /// Append one snapshot, enforcing the retention cap, and persist.
    pub fn record(&mut self, project_dir: &Path, snapshot: Snapshot) -> Result<()> {
        self.snapshots.push(snapshot);
        if self.snapshots.len() > MAX_SNAPSHOTS {
            let drop = self.snapshots.len() - MAX_SNAPSHOTS;
            self.snapshots.drain(..drop);
        }
        self.save(project_dir)
    }

    fn save(&self, project_dir: &Path) -> Result<()> {
        let path = Self::path_for(project_dir);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

/// Module-level differences between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub added: Vec<SnapshotModule>,
    pub removed: Vec<SnapshotModule>,
    /// (before, after) for modules whose version, risk or capabilities
    /// changed.
    pub changed: Vec<(SnapshotModule, SnapshotModule)>,
}

pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff {
        added: Vec::new(),
        removed: Vec::new(),
        changed: Vec::new(),
    };
    for module in &new.modules {
        match old.modules.iter().find(|m| m.path == module.path) {
            None => diff.added.push(module.clone()),
            Some(before) => {
                let same = before.version == module.version
                    && before.risk_level == module.risk_level
                    && before.capabilities == module.capabilities;
                if !same {
                    diff.changed.push((before.clone(), module.clone()));
                }
            }
        }
    }
    for module in &old.modules {
        if !new.modules.iter().any(|m| m.path == module.path) {
            diff.removed.push(module.clone());
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(mods: &[(&str, &str, RiskLevel)]) -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            commit: None,
            modules: mods
                .iter()
                .map(|(path, version, risk)| SnapshotModule {
                    path: path.to_string(),
                    version: version.to_string(),
                    risk_level: *risk,
                    effective_score: 0.0,
                    capabilities: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_record_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::default();
        store
            .record(tmp.path(), snapshot(&[("a", "v1", RiskLevel::Low)]))
            .unwrap();

        let reloaded = HistoryStore::load(tmp.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(0).unwrap().modules[0].path, "a");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode_0600() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::default();
        store
            .record(tmp.path(), snapshot(&[("a", "v1", RiskLevel::Low)]))
            .unwrap();
        let mode = std::fs::metadata(HistoryStore::path_for(tmp.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_retention_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::default();
        for i in 0..130 {
            store
                .record(
                    tmp.path(),
                    snapshot(&[("a", &format!("v{i}"), RiskLevel::Low)]),
                )
                .unwrap();
        }
        assert_eq!(store.len(), 100);
        // oldest entries dropped, newest kept
        assert_eq!(store.latest().unwrap().modules[0].version, "v129");
        let reloaded = HistoryStore::load(tmp.path()).unwrap();
        assert_eq!(reloaded.len(), 100);
    }

    #[test]
    fn test_diff_snapshots() {
        let old = snapshot(&[("a", "v1", RiskLevel::Low), ("b", "v1", RiskLevel::Low)]);
        let new = snapshot(&[("a", "v2", RiskLevel::Medium), ("c", "v1", RiskLevel::Low)]);
        let diff = diff_snapshots(&old, &new);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].path, "c");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].path, "b");
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].1.version, "v2");
    }
}
