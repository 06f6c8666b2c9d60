use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, Result};
use crate::store::StoreKind;

/// Default memory granted to the node cache arena.
pub const DEFAULT_CACHE_BUDGET_BYTES: u64 = 64 * 1024 * 1024;
/// Default number of findings echoed to the log before going quiet.
pub const DEFAULT_MAX_FINDINGS_LOGGED: usize = 32;

/// How relationship chain pointers are verified.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainCheckMode {
    /// Two ordered scans per pass window, resolving back references from
    /// the node cache where possible.
    #[default]
    Cached,
    /// One forward scan that reads every referenced relationship from the
    /// store. Slow; useful as a reference and for small stores.
    Direct,
}

/// Payload capacity of a block in each dynamic store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSizes {
    /// Long string blocks.
    pub string: usize,
    /// Array blocks.
    pub array: usize,
    /// Node label array blocks.
    pub labels: usize,
    /// Token name blocks.
    pub name: usize,
}

impl Default for BlockSizes {
    fn default() -> Self {
        Self {
            string: 120,
            array: 120,
            labels: 60,
            name: 30,
        }
    }
}

impl BlockSizes {
    /// Sets the string block size.
    pub fn string(mut self, bytes: usize) -> Self {
        self.string = bytes;
        self
    }

    /// Sets the array block size.
    pub fn array(mut self, bytes: usize) -> Self {
        self.array = bytes;
        self
    }

    /// Sets the label array block size.
    pub fn labels(mut self, bytes: usize) -> Self {
        self.labels = bytes;
        self
    }

    /// Sets the token name block size.
    pub fn name(mut self, bytes: usize) -> Self {
        self.name = bytes;
        self
    }

    /// Block size of a dynamic store; zero for stores that are not dynamic.
    pub fn for_store(&self, store: StoreKind) -> usize {
        match store {
            StoreKind::String => self.string,
            StoreKind::Array => self.array,
            StoreKind::NodeLabels => self.labels,
            StoreKind::LabelName | StoreKind::RelationshipTypeName | StoreKind::PropertyKeyName => {
                self.name
            }
            _ => 0,
        }
    }
}

/// Options controlling a consistency check run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    /// Worker threads for record and chain checks.
    pub workers: usize,
    /// Bytes available to the node cache; bounds the nodes per pass.
    pub cache_budget_bytes: u64,
    /// Explicit pass window size, overriding the cache budget.
    pub nodes_per_pass: Option<u64>,
    /// Relationship chain verification strategy.
    pub chain_mode: ChainCheckMode,
    /// Walk each property's owner chain to confirm the owner reaches it,
    /// and report property chains and dynamic blocks owned twice or not at
    /// all. Holds one map entry per owned record while the stores are read.
    pub check_property_owners: bool,
    /// Run the schema rule checker.
    pub check_schema: bool,
    /// Findings echoed through `tracing` before logging stops.
    pub max_findings_logged: usize,
    /// Dynamic store block sizes.
    pub block_sizes: BlockSizes,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            nodes_per_pass: None,
            chain_mode: ChainCheckMode::Cached,
            check_property_owners: false,
            check_schema: true,
            max_findings_logged: DEFAULT_MAX_FINDINGS_LOGGED,
            block_sizes: BlockSizes::default(),
        }
    }
}

impl CheckOptions {
    /// Sets the worker thread count.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the node cache budget in bytes.
    pub fn cache_budget_bytes(mut self, bytes: u64) -> Self {
        self.cache_budget_bytes = bytes;
        self
    }

    /// Fixes the pass window size.
    pub fn nodes_per_pass(mut self, nodes: u64) -> Self {
        self.nodes_per_pass = Some(nodes);
        self
    }

    /// Selects the chain verification strategy.
    pub fn chain_mode(mut self, mode: ChainCheckMode) -> Self {
        self.chain_mode = mode;
        self
    }

    /// Enables or disables the property owner walk and the ownership map.
    pub fn check_property_owners(mut self, enabled: bool) -> Self {
        self.check_property_owners = enabled;
        self
    }

    /// Enables or disables the schema checker.
    pub fn check_schema(mut self, enabled: bool) -> Self {
        self.check_schema = enabled;
        self
    }

    /// Sets how many findings are echoed to the log.
    pub fn max_findings_logged(mut self, max: usize) -> Self {
        self.max_findings_logged = max;
        self
    }

    /// Replaces the dynamic block sizes.
    pub fn block_sizes(mut self, sizes: BlockSizes) -> Self {
        self.block_sizes = sizes;
        self
    }

    /// Parses options from TOML; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let options: CheckOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads and parses an options file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Rejects settings the checker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConsistencyError::config("workers must be at least 1"));
        }
        if self.nodes_per_pass == Some(0) {
            return Err(ConsistencyError::config("nodes_per_pass must be at least 1"));
        }
        if self.nodes_per_pass.is_none() && self.cache_budget_bytes == 0 {
            return Err(ConsistencyError::config(
                "cache_budget_bytes must be non-zero when nodes_per_pass is not set",
            ));
        }
        let sizes = &self.block_sizes;
        if [sizes.string, sizes.array, sizes.labels, sizes.name].contains(&0) {
            return Err(ConsistencyError::config("dynamic block sizes must be non-zero"));
        }
        Ok(())
    }

    /// Pass window size for cache blocks of `block_bytes` bytes each.
    pub fn window_size(&self, block_bytes: usize) -> u64 {
        match self.nodes_per_pass {
            Some(nodes) => nodes.max(1),
            None => (self.cache_budget_bytes / block_bytes.max(1) as u64).max(1),
        }
    }
}
