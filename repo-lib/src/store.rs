use crate::{
    placeholder_signature, ContentObject, Name, NameTrie, ObjectRow, RepoError, RepoResult,
    StoreDb,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const CONFIG_FILE_NAME: &str = "content_store.json";
const DEFAULT_DB_FILE: &str = "objects.db";

/// Access mode, fixed for the store's lifetime at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub read_only: bool,
    pub db_path: Option<PathBuf>,
    /// URI of a Name prepended to every object name at write time.
    /// Reads always use the literal name supplied by the caller.
    pub rename_prefix: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            db_path: None,
            rename_prefix: None,
        }
    }
}

/// Key count and aggregate payload bytes, recomputed by each discovery
/// scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub n_keys: u64,
    pub payload_bytes: u64,
}

/// Lookup request for `ContentStore::read`. Exact mode behaves like
/// `get`; prefix mode scans forward from the name in key order.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub name: Name,
    pub prefix_match: bool,
    pub min_suffix_components: Option<usize>,
    pub max_suffix_components: Option<usize>,
}

impl ReadRequest {
    pub fn exact(name: Name) -> Self {
        Self {
            name,
            prefix_match: false,
            min_suffix_components: None,
            max_suffix_components: None,
        }
    }

    pub fn prefix(name: Name) -> Self {
        Self {
            name,
            prefix_match: true,
            min_suffix_components: None,
            max_suffix_components: None,
        }
    }

    pub fn with_min_suffix_components(mut self, min: usize) -> Self {
        self.min_suffix_components = Some(min);
        self
    }

    pub fn with_max_suffix_components(mut self, max: usize) -> Self {
        self.max_suffix_components = Some(max);
        self
    }
}

type InsertHook = Box<dyn Fn(&Name) + Send + Sync>;

#[derive(Default)]
struct DiscoveryState {
    trie: NameTrie,
    stats: Stats,
}

/// Persistent ordered name-to-object mapping. Append-only through this
/// interface: objects are never mutated or deleted.
pub struct ContentStore {
    db: Arc<StoreDb>,
    mode: StoreMode,
    rename_prefix: Option<Name>,
    discovery: Mutex<DiscoveryState>,
    after_insert: Option<InsertHook>,
}

impl ContentStore {
    /// Open a store rooted at a directory. The directory holds a JSON
    /// config file (created with defaults on first open) and the db
    /// file. Read-only mode requires the directory and db to exist.
    pub fn open(root_path: &Path, mode: StoreMode) -> RepoResult<Self> {
        if !root_path.exists() {
            if mode == StoreMode::ReadOnly {
                return Err(RepoError::Open(format!(
                    "store dir missing in read-only mode: {}",
                    root_path.to_string_lossy()
                )));
            }
            debug!("ContentStore: create store dir: {}", root_path.to_string_lossy());
            std::fs::create_dir_all(root_path)
                .map_err(|e| RepoError::Open(format!("create store dir failed: {}", e)))?;
        }

        let config_path = root_path.join(CONFIG_FILE_NAME);
        let config = if !config_path.exists() {
            let config = StoreConfig::default();
            if mode == StoreMode::ReadWrite {
                let config_str = serde_json::to_string(&config)
                    .map_err(|e| RepoError::Internal(e.to_string()))?;
                std::fs::write(&config_path, config_str)
                    .map_err(|e| RepoError::Open(format!("write config failed: {}", e)))?;
            }
            config
        } else {
            let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
                warn!("ContentStore: read config failed! {}", e);
                RepoError::Open(format!("read config failed: {}", e))
            })?;
            serde_json::from_str::<StoreConfig>(&config_str).map_err(|e| {
                warn!("ContentStore: parse config failed! {}", e);
                RepoError::Open(format!("config invalid: {}", e))
            })?
        };

        let db_path = config
            .db_path
            .clone()
            .unwrap_or_else(|| root_path.join(DEFAULT_DB_FILE));
        let read_only = mode == StoreMode::ReadOnly || config.read_only;
        let effective_mode = if read_only {
            StoreMode::ReadOnly
        } else {
            StoreMode::ReadWrite
        };

        let rename_prefix = match &config.rename_prefix {
            Some(uri) => Some(Name::from_uri(uri)?),
            None => None,
        };

        let db = StoreDb::open(&db_path, read_only)?;
        Ok(Self {
            db: Arc::new(db),
            mode: effective_mode,
            rename_prefix,
            discovery: Mutex::new(DiscoveryState::default()),
            after_insert: None,
        })
    }

    /// Open a bare db file without the config layer.
    pub fn open_db(db_path: &Path, mode: StoreMode) -> RepoResult<Self> {
        let db = StoreDb::open(db_path, mode == StoreMode::ReadOnly)?;
        Ok(Self {
            db: Arc::new(db),
            mode,
            rename_prefix: None,
            discovery: Mutex::new(DiscoveryState::default()),
            after_insert: None,
        })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn rename_prefix(&self) -> Option<&Name> {
        self.rename_prefix.as_ref()
    }

    pub fn with_rename_prefix(mut self, prefix: Name) -> Self {
        self.rename_prefix = Some(prefix);
        self
    }

    /// Install a hook invoked with the stored name after each
    /// successful put.
    pub fn set_after_insert(&mut self, hook: InsertHook) {
        self.after_insert = Some(hook);
    }

    /// Persist an object. With a rename prefix configured the object
    /// is republished as `{prefix}{name}` with the placeholder digest
    /// signature attached; otherwise it is stored verbatim. Returns
    /// the stored name.
    pub fn put(&self, object: &ContentObject) -> RepoResult<Name> {
        if self.mode == StoreMode::ReadOnly {
            return Err(RepoError::InvalidState(
                "put on a read-only store".to_string(),
            ));
        }

        let stored_name = match &self.rename_prefix {
            Some(prefix) => {
                let renamed = prefix.append_name(&object.name);
                debug!("ContentStore: put {} as {}", object.name, renamed);
                self.db.put_object(
                    &renamed.to_uri(),
                    &object.payload,
                    &object.content_type,
                    Some(&placeholder_signature()),
                )?;
                renamed
            }
            None => {
                self.db.put_object(
                    &object.name.to_uri(),
                    &object.payload,
                    &object.content_type,
                    object.signature.as_deref(),
                )?;
                object.name.clone()
            }
        };

        if let Some(hook) = &self.after_insert {
            hook(&stored_name);
        }
        Ok(stored_name)
    }

    /// Exact-key lookup. Absence is `Ok(None)`, not an error.
    pub fn get(&self, name: &Name) -> RepoResult<Option<ContentObject>> {
        match self.db.get_object(&name.to_uri())? {
            Some(row) => Ok(Some(row_to_object(row)?)),
            None => Ok(None),
        }
    }

    /// Exact or prefix lookup. Prefix mode scans forward from the
    /// request name while keys keep it as a literal string prefix and,
    /// when suffix-component bounds are given, admits a key when
    /// either bound passes. The match returned is the last admitted
    /// key of the scan, i.e. the lexicographically greatest. Callers
    /// depend on both the either-bound admission and the last-key
    /// policy; see DESIGN.md before changing them.
    pub fn read(&self, request: &ReadRequest) -> RepoResult<Option<ContentObject>> {
        if !request.prefix_match {
            return self.get(&request.name);
        }

        let prefix_uri = request.name.to_uri();
        let keys = self.db.scan_prefix_keys(&prefix_uri, &prefix_uri)?;
        let check_max = request.max_suffix_components.is_some();
        let check_min = request.min_suffix_components.is_some();

        let mut chosen: Option<String> = None;
        for key in keys {
            if check_max || check_min {
                let key_name = Name::from_uri(&key)?;
                let n_suffix =
                    key_name.component_count() as i64 - request.name.component_count() as i64;
                let mut pass = false;
                if let Some(max) = request.max_suffix_components {
                    if n_suffix <= max as i64 {
                        pass = true;
                    }
                }
                if let Some(min) = request.min_suffix_components {
                    if n_suffix >= min as i64 {
                        pass = true;
                    }
                }
                if pass {
                    chosen = Some(key);
                }
            } else {
                chosen = Some(key);
            }
        }

        match chosen {
            Some(key) => self.get(&Name::from_uri(&key)?),
            None => Ok(None),
        }
    }

    /// Discovery primitive: one full key scan, a wholesale trie and
    /// stats rebuild, then one Name per top-level branch (the maximal
    /// common prefix of that branch). Concurrent scans race on the
    /// shared trie/stats (last rebuild wins); callers serialize
    /// discovery themselves.
    pub async fn scan_for_longest_prefixes(&self) -> RepoResult<Vec<Name>> {
        let db = self.db.clone();
        let rows = tokio::task::spawn_blocking(move || db.scan_all())
            .await
            .map_err(|e| RepoError::Internal(format!("scan task failed: {}", e)))??;

        let mut trie = NameTrie::new();
        let mut stats = Stats::default();
        for (key, payload_len) in &rows {
            trie.insert(key);
            stats.n_keys += 1;
            stats.payload_bytes += payload_len;
        }
        debug!(
            "ContentStore: discovery scan: {} keys, {} payload bytes",
            stats.n_keys, stats.payload_bytes
        );

        let prefixes = trie.longest_prefixes();
        let mut discovery = self.discovery.lock().unwrap();
        discovery.trie = trie;
        discovery.stats = stats;
        Ok(prefixes)
    }

    /// Stats from the most recent discovery scan.
    pub fn stats(&self) -> Stats {
        self.discovery.lock().unwrap().stats
    }
}

fn row_to_object(row: ObjectRow) -> RepoResult<ContentObject> {
    Ok(ContentObject {
        name: Name::from_uri(&row.key)?,
        payload: Bytes::from(row.payload),
        content_type: row.content_type,
        signature: row.signature.map(Bytes::from),
    })
}
