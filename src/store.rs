use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::accounts::Account;
use crate::directory::AccountId;

pub type Snapshot = BTreeMap<AccountId, Account>;

pub trait AccountsStore {
    /// load returns every persisted account, or an empty snapshot when nothing was saved yet
    fn load(&self) -> Result<Snapshot>;
    fn save(&self, accounts: &Snapshot) -> Result<()>;
}

pub struct MemoryStore {
    data: RefCell<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            data: RefCell::new(BTreeMap::new()),
        }
    }
}

impl AccountsStore for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.data.borrow().clone())
    }
    fn save(&self, accounts: &Snapshot) -> Result<()> {
        *self.data.borrow_mut() = accounts.clone();
        Ok(())
    }
}

/// JsonFileStore keeps the whole snapshot in one JSON document.
///
/// Saves go to a sibling temporary file which is then renamed over the target,
/// so a reader sees either the previous or the next snapshot.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> JsonFileStore {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl AccountsStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("unable to open {}", self.path.display()))?;
        let accounts = serde_json::from_reader(file)
            .with_context(|| format!("unable to parse {}", self.path.display()))?;
        Ok(accounts)
    }
    fn save(&self, accounts: &Snapshot) -> Result<()> {
        let tmp = self.temp_path();
        let res = write_json(&tmp, accounts).and_then(|()| {
            fs::rename(&tmp, &self.path)
                .with_context(|| format!("unable to replace {}", self.path.display()))
        });
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res
    }
}

fn write_json(path: &Path, accounts: &Snapshot) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("unable to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, accounts)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
