//! Last known switch states and cost counters, kept across runs
//!
//! Every `pplx-assist` invocation is its own process, so writes never replace
//! the file from an in-memory copy: each one takes an exclusive lock, re-reads
//! the file, changes its own section and renames a fresh file into place.

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::config::APP_NAME;
use crate::cost::{CostLedger, CostSnapshot};
use crate::switches::SwitchKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub switches: BTreeMap<SwitchKind, bool>,
    pub costs: Option<CostSnapshot>,
}

/// JSON state file under the XDG state directory
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(state_dir()?.join("state.json")))
    }

    pub fn open(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current file contents; a missing or corrupt file reads as empty
    pub fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state from {}", self.path.display()))?;

        Ok(serde_json::from_str(&content).unwrap_or_else(|err| {
            log::warn!("Ignoring corrupt state file {}: {err}", self.path.display());
            PersistedState::default()
        }))
    }

    pub fn save_switch(&self, kind: SwitchKind, on: bool) -> Result<()> {
        self.transact(|state| {
            state.switches.insert(kind, on);
        })
    }

    /// Read-modify-write under the state lock
    fn transact<R>(&self, change: impl FnOnce(&mut PersistedState) -> R) -> Result<R> {
        let _lock = self.lock()?;

        let mut state = self.load()?;
        let result = change(&mut state);
        self.write(&state)?;

        Ok(result)
    }

    /// Exclusive lock on a sibling `.lock` file, released when dropped
    fn lock(&self) -> Result<File> {
        self.ensure_parent()?;

        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening lock file {}", lock_path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("locking {}", lock_path.display()))?;
        Ok(file)
    }

    fn write(&self, state: &PersistedState) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;

        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("writing state to {}", self.path.display()))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory {}", parent.display()))?;
        }
        Ok(())
    }
}

impl CostLedger for StateStore {
    fn update(
        &self,
        fallback: CostSnapshot,
        op: &mut dyn FnMut(&mut CostSnapshot),
    ) -> Result<CostSnapshot> {
        self.transact(|state| {
            let costs = state.costs.get_or_insert(fallback);
            op(costs);
            *costs
        })
    }
}

fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::state_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_NAME))
        .ok_or_else(|| anyhow::anyhow!("unable to determine state directory"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::cost::{BillingMonth, CostAccumulator};

    const OCTOBER: BillingMonth = BillingMonth {
        year: 2026,
        month: 10,
    };

    fn accumulator(path: &Path) -> CostAccumulator {
        let store = Arc::new(StateStore::open(path.to_path_buf()));
        let snapshot = store
            .load()
            .unwrap()
            .costs
            .unwrap_or_else(|| CostSnapshot::zero(OCTOBER));
        CostAccumulator::restore(snapshot).with_ledger(store)
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json"));

        assert_eq!(store.load().unwrap(), PersistedState::default());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = StateStore::open(path.clone());
        store.save_switch(SwitchKind::EntityActions, true).unwrap();
        store
            .update(CostSnapshot::zero(OCTOBER), &mut |costs: &mut CostSnapshot| {
                costs.monthly += 0.5;
                costs.all_time += 1.5;
            })
            .unwrap();

        let reopened = StateStore::open(path).load().unwrap();
        assert_eq!(reopened.switches[&SwitchKind::EntityActions], true);
        let costs = reopened.costs.unwrap();
        assert_eq!(costs.all_time, 1.5);
        assert_eq!(costs.month, OCTOBER);
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = StateStore::open(path);
        assert_eq!(store.load().unwrap(), PersistedState::default());
    }

    #[test]
    fn test_stores_on_one_path_keep_each_others_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first = accumulator(&path);
        let second = accumulator(&path);
        StateStore::open(path.clone())
            .save_switch(SwitchKind::EntityActions, true)
            .unwrap();

        first.increment_at(0.5, OCTOBER);
        second.increment_at(0.25, OCTOBER);

        let state = StateStore::open(path).load().unwrap();
        let costs = state.costs.unwrap();
        assert_eq!(costs.all_time, 0.75);
        assert_eq!(costs.monthly, 0.75);
        assert_eq!(state.switches[&SwitchKind::EntityActions], true);
    }

    #[test]
    fn test_switch_save_leaves_costs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        accumulator(&path).increment_at(0.5, OCTOBER);
        StateStore::open(path.clone())
            .save_switch(SwitchKind::WebSearch, false)
            .unwrap();

        let state = StateStore::open(path).load().unwrap();
        assert_eq!(state.costs.unwrap().all_time, 0.5);
        assert_eq!(state.switches[&SwitchKind::WebSearch], false);
    }

    #[test]
    fn test_parallel_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let costs = accumulator(&path);
                    for _ in 0..10 {
                        costs.increment_at(0.5, OCTOBER);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let costs = StateStore::open(path).load().unwrap().costs.unwrap();
        assert_eq!(costs.all_time, 40.0);
    }

    #[test]
    fn test_state_dir() {
        let dir = state_dir().unwrap();
        assert!(dir.to_string_lossy().contains(APP_NAME));
    }
}
