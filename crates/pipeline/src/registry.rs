use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::instrument;
use x360mse_saveinfo::error::Result as SaveInfoResult;
use x360mse_saveinfo::{SaveBin, SaveInfoParser};

/// Length of the `.bin` suffix removed from keys before the staged-name join.
const KEY_SUFFIX_LEN: usize = 4;

#[derive(Debug, Default)]
struct Bindings {
    /// Insertion order; a rebound key keeps its original position.
    bins: Vec<SaveBin>,
    index: HashMap<String, usize>,
}

/// Every title binding seen so far, keyed by internal save file name.
///
/// Shared between concurrently running extraction jobs. Keys are compared
/// exactly (case and whitespace included); binding an existing key again
/// replaces its title.
#[derive(Debug, Default)]
pub struct SaveBinRegistry {
    inner: RwLock<Bindings>,
}

impl SaveBinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a descriptor and bind everything in it, returning how many
    /// bindings were accepted.
    #[instrument(skip(self, parser), fields(path = %descriptor.display()))]
    pub fn ingest(&self, descriptor: &Path, parser: &dyn SaveInfoParser) -> SaveInfoResult<usize> {
        let mut accepted = 0;
        for bin in parser.parse(descriptor)? {
            if join_key(&bin.internal_file_name).trim().is_empty() {
                tracing::warn!(key = %bin.internal_file_name, title = %bin.display_title, "Skipping binding with an empty key");
                continue;
            }
            self.insert(bin);
            accepted += 1;
        }
        tracing::debug!(accepted, total = self.len(), "Descriptor ingested");
        Ok(accepted)
    }

    pub fn insert(&self, bin: SaveBin) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.index.get(&bin.internal_file_name).copied() {
            Some(position) => {
                tracing::debug!(key = %bin.internal_file_name, "Rebinding save title");
                inner.bins[position] = bin;
            },
            None => {
                let position = inner.bins.len();
                inner.index.insert(bin.internal_file_name.clone(), position);
                inner.bins.push(bin);
            },
        }
    }

    pub fn len(&self) -> usize {
        self.read(|b| b.bins.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of all bindings in insertion order.
    pub fn bins(&self) -> Vec<SaveBin> {
        self.read(|b| b.bins.clone())
    }

    /// Exact lookup by internal file name.
    pub fn lookup_by_filename(&self, name: &str) -> Option<SaveBin> {
        self.read(|b| b.index.get(name).map(|&position| b.bins[position].clone()))
    }

    /// Best-effort lookup for a file that has already been renamed.
    ///
    /// Each key, minus its `.bin` suffix, is searched for inside
    /// `staged_name`; the earliest binding that matches wins. So
    /// `Steve's World (SaveProfile) (2).bin` resolves through the key
    /// `SaveProfile.bin`.
    pub fn lookup_by_staged_name(&self, staged_name: &str) -> Option<SaveBin> {
        self.read(|b| {
            b.bins
                .iter()
                .find(|bin| {
                    let key = join_key(&bin.internal_file_name);
                    !key.is_empty() && staged_name.contains(key)
                })
                .cloned()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Bindings) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// The key with its fixed-length suffix removed. Keys too short (or with a
/// multi-byte character where the cut falls) have nothing to join on.
fn join_key(key: &str) -> &str {
    key.len()
        .checked_sub(KEY_SUFFIX_LEN)
        .and_then(|cut| key.get(..cut))
        .unwrap_or_default()
}
