/*! Progress ledger.

Append-only, newline separated list of completed partitions (chambers for the NLP pipeline,
spiders for extractors). An entry is only ever written once, and is written only after the
work it stands for is fully persisted, so a run can be interrupted and restarted at any point.
!*/
use std::{
    collections::HashSet,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use crate::error::Error;

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl Ledger {
    /// Open the ledger at `path`, creating an empty one if it does not exist yet.
    ///
    /// The parent directory has to exist.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            debug!("creating ledger {:?}", path);
            File::create(path)?;
        }

        // entries are kept verbatim so that they match what `record` wrote
        let entries = std::fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn entries(&self) -> &HashSet<String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates that are not recorded yet. Order is unspecified.
    pub fn pending<I, S>(&self, candidates: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        candidates
            .into_iter()
            .map(Into::into)
            .filter(|c| !self.entries.contains(c))
            .collect()
    }

    /// Append `entry` to the ledger and sync it to disk.
    ///
    /// Recording an entry that is already present is a no-op.
    pub fn record(&mut self, entry: &str) -> Result<(), Error> {
        if entry.contains(['\n', '\r']) || entry.trim().is_empty() {
            return Err(Error::Custom(format!("invalid ledger entry: {:?}", entry)));
        }
        if self.entries.contains(entry) {
            return Ok(());
        }

        let mut f = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(f, "{}", entry)?;
        f.sync_data()?;

        self.entries.insert(entry.to_string());
        Ok(())
    }
}
