use crate::Name;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct TrieNode {
    is_terminal: bool,
    children: HashMap<String, TrieNode>,
}

/// In-memory tree over the store's key set, one node per name
/// component. Rebuilt wholesale on each discovery scan; no incremental
/// maintenance.
#[derive(Debug, Default)]
pub struct NameTrie {
    head: TrieNode,
}

impl NameTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a URI-encoded key. Empty segments are skipped, so keys
    /// with or without a leading '/' land in the same branch.
    pub fn insert(&mut self, key: &str) {
        let mut curr = &mut self.head;
        for component in key.split('/') {
            if component.is_empty() {
                continue;
            }
            curr = curr.children.entry(component.to_string()).or_default();
        }
        curr.is_terminal = true;
    }

    /// One Name per top-level branch: the maximal common prefix,
    /// obtained by walking down while the node has exactly one child
    /// and is not itself a stored key.
    pub fn longest_prefixes(&self) -> Vec<Name> {
        let mut prefixes = Vec::new();
        for (component, node) in &self.head.children {
            let mut name = Name::new().append(component.clone());
            let mut curr = node;
            while !curr.is_terminal && curr.children.len() == 1 {
                let (child_component, child) = curr.children.iter().next().unwrap();
                name = name.append(child_component.clone());
                curr = child;
            }
            prefixes.push(name);
        }
        prefixes
    }
}
