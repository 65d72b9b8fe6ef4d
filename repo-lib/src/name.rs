use crate::{RepoError, RepoResult};
use std::cmp::Ordering;
use std::fmt;

/// A hierarchical name: an ordered sequence of opaque string components.
/// Immutable once constructed; `append*` return a new Name.
///
/// The URI encoding joins components with '/', escaping literal '/' and
/// '%' inside a component. Store keys and all ordering comparisons use
/// this encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<String>,
}

fn escape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_component(escaped: &str) -> RepoResult<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return Err(RepoError::InvalidName(format!(
                    "truncated escape in component: {}",
                    escaped
                )));
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .map_err(|_| RepoError::InvalidName(format!("bad escape in: {}", escaped)))?;
            let value = u8::from_str_radix(hex, 16).map_err(|_| {
                RepoError::InvalidName(format!("bad escape '%{}' in: {}", hex, escaped))
            })?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| RepoError::InvalidName(format!("component is not utf-8: {}", escaped)))
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse a URI-style name. Empty segments (leading '/', "//") are
    /// skipped, so "/a/b", "a/b" and "a//b" all yield the same name.
    pub fn from_uri(uri: &str) -> RepoResult<Self> {
        let mut components = Vec::new();
        for segment in uri.split('/') {
            if segment.is_empty() {
                continue;
            }
            components.push(unescape_component(segment)?);
        }
        Ok(Self { components })
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut uri = String::new();
        for component in &self.components {
            uri.push('/');
            uri.push_str(&escape_component(component));
        }
        uri
    }

    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn append(&self, component: impl Into<String>) -> Name {
        let mut components = self.components.clone();
        components.push(component.into());
        Name { components }
    }

    pub fn append_name(&self, other: &Name) -> Name {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Name { components }
    }

    /// Append every component of a URI-style suffix, e.g. "nontile/7".
    pub fn append_uri(&self, suffix: &str) -> RepoResult<Name> {
        Ok(self.append_name(&Name::from_uri(suffix)?))
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

// Ordering is lexicographic on the encoded URI, matching the store's
// key order. Note "10" sorts before "2".
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_uri().cmp(&other.to_uri())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_uri_round_trip() {
        let name = Name::from_uri("/video/tile/3/0/1").unwrap();
        assert_eq!(name.component_count(), 5);
        assert_eq!(name.component(0), Some("video"));
        assert_eq!(name.component(4), Some("1"));
        assert_eq!(name.to_uri(), "/video/tile/3/0/1");
        assert_eq!(Name::from_uri(&name.to_uri()).unwrap(), name);
    }

    #[test]
    fn test_empty_and_redundant_slashes() {
        assert_eq!(Name::new().to_uri(), "/");
        let a = Name::from_uri("a//b/").unwrap();
        let b = Name::from_uri("/a/b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_escaping() {
        let name = Name::new().append("a/b").append("100%");
        let uri = name.to_uri();
        assert_eq!(uri, "/a%2Fb/100%25");
        let parsed = Name::from_uri(&uri).unwrap();
        assert_eq!(parsed, name);
        assert_eq!(parsed.component(0), Some("a/b"));
    }

    #[test]
    fn test_bad_escape() {
        assert!(Name::from_uri("/a%2").is_err());
        assert!(Name::from_uri("/a%zz").is_err());
    }

    #[test]
    fn test_prefix_and_append() {
        let prefix = Name::from_uri("/video").unwrap();
        let full = prefix.append("nontile").append("12");
        assert!(prefix.is_prefix_of(&full));
        assert!(!full.is_prefix_of(&prefix));
        assert!(prefix.is_prefix_of(&prefix));
        assert_eq!(full.to_uri(), "/video/nontile/12");

        let joined = prefix.append_uri("tile/1/0/0").unwrap();
        assert_eq!(joined.to_uri(), "/video/tile/1/0/0");
    }

    #[test]
    fn test_string_ordering_not_numeric() {
        let ten = Name::from_uri("/f/10").unwrap();
        let two = Name::from_uri("/f/2").unwrap();
        assert!(ten < two);
    }
}
