use crate::codec::{TileGrid, TileSource};
use crate::naming;
use bytes::Bytes;
use repo_lib::{ContentStore, Name};
use std::collections::{BTreeSet, HashMap};

/// The wanted (row, col) pairs. The empty set is a sentinel meaning
/// "all tiles, grid dimensions unknown yet"; it is resolved to the full
/// cross product the first time the decoder reports the grid.
pub type TileSelection = BTreeSet<(u32, u32)>;

/// Read side of the tile adapter: anything that can hand back the
/// bytes of a stored or arrived object by name.
pub trait ObjectSource {
    fn object_bytes(&self, name: &Name) -> Option<Bytes>;
}

/// Arrived objects retained for decode, keyed by URI.
#[derive(Default)]
pub struct ObjectCache {
    objects: HashMap<String, Bytes>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &Name, payload: Bytes) {
        self.objects.insert(name.to_uri(), payload);
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.objects.contains_key(&name.to_uri())
    }

    pub fn get(&self, name: &Name) -> Option<&Bytes> {
        self.objects.get(&name.to_uri())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectSource for ObjectCache {
    fn object_bytes(&self, name: &Name) -> Option<Bytes> {
        self.get(name).cloned()
    }
}

impl ObjectSource for ContentStore {
    fn object_bytes(&self, name: &Name) -> Option<Bytes> {
        match self.get(name) {
            Ok(object) => object.map(|o| o.payload),
            Err(e) => {
                warn!("object lookup for {} failed: {}", name, e);
                None
            }
        }
    }
}

/// Translates the decoder's per-tile-group buffer callback into lookups
/// of stored tile objects under `{prefix}/tile/...`. Owns the running
/// tile group counter, which is incremented before each use and seeded
/// from the non-tile segment's first tile group index.
pub struct TileSelectionAdapter<'a> {
    selection: &'a mut TileSelection,
    source: &'a dyn ObjectSource,
    stream_prefix: &'a Name,
    next_tile_group: i64,
}

impl<'a> TileSelectionAdapter<'a> {
    pub fn new(
        selection: &'a mut TileSelection,
        source: &'a dyn ObjectSource,
        stream_prefix: &'a Name,
        first_tile_group: u32,
    ) -> Self {
        Self {
            selection,
            source,
            stream_prefix,
            next_tile_group: first_tile_group as i64 - 1,
        }
    }
}

impl TileSource for TileSelectionAdapter<'_> {
    fn fill_tile_buffers(
        &mut self,
        n_rows: usize,
        n_cols: usize,
        buffers: &mut TileGrid,
    ) -> bool {
        self.next_tile_group += 1;
        let tile_group = self.next_tile_group;

        if self.selection.is_empty() {
            // Sentinel: the grid dimensions were unknown until now.
            // Record the full cross product and leave every buffer
            // empty; the scheduler restarts fetching for the resolved
            // selection.
            for row in 0..n_rows {
                for col in 0..n_cols {
                    self.selection.insert((row as u32, col as u32));
                }
            }
            return true;
        }

        for &(row, col) in self.selection.iter() {
            if row as usize >= n_rows || col as usize >= n_cols {
                // Out of range for this grid.
                continue;
            }
            let name = naming::tile_name(self.stream_prefix, tile_group, row, col);
            match self.source.object_bytes(&name) {
                Some(data) => buffers.set(row as usize, col as usize, data),
                None => warn!("no tile data for {}", name),
            }
        }
        true
    }
}
