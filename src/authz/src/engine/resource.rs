//! Request resource canonicalization
//!
//! Permissions name resources (`doc`), requests name paths (`/docs/1`). The
//! mapper turns a request path into the permission resource name through a
//! configured prefix table; the longest matching prefix wins. An unmapped
//! resource is used verbatim.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ResourceMapper {
    /// `(prefix without trailing slash, resource name)`, longest prefix first
    prefixes: Vec<(String, String)>,
}

impl ResourceMapper {
    /// Build from a `resource name → path prefix` table
    pub fn new(paths: &BTreeMap<String, String>) -> Self {
        let mut prefixes: Vec<(String, String)> = paths
            .iter()
            .map(|(name, prefix)| (prefix.trim_end_matches('/').to_string(), name.clone()))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();

        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { prefixes }
    }

    /// Permission resource name for a request resource
    pub fn canonical<'a>(&'a self, resource: &'a str) -> &'a str {
        self.prefixes
            .iter()
            .find(|(prefix, _)| matches_prefix(resource, prefix))
            .map(|(_, name)| name.as_str())
            .unwrap_or(resource)
    }
}

/// `resource` is `prefix`, `prefix/`, or lies below `prefix/`
fn matches_prefix(resource: &str, prefix: &str) -> bool {
    match resource.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(pairs: &[(&str, &str)]) -> ResourceMapper {
        let paths = pairs
            .iter()
            .map(|(name, prefix)| (name.to_string(), prefix.to_string()))
            .collect();
        ResourceMapper::new(&paths)
    }

    #[test]
    fn test_identity_without_table() {
        let mapper = ResourceMapper::default();
        assert_eq!(mapper.canonical("/docs/1"), "/docs/1");
        assert_eq!(mapper.canonical("doc"), "doc");
    }

    #[test]
    fn test_prefix_match() {
        let mapper = mapper(&[("doc", "/docs/")]);
        assert_eq!(mapper.canonical("/docs/1"), "doc");
        assert_eq!(mapper.canonical("/docs"), "doc");
        assert_eq!(mapper.canonical("/docs/"), "doc");
        assert_eq!(mapper.canonical("/docsets/1"), "/docsets/1");
        assert_eq!(mapper.canonical("doc"), "doc");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mapper = mapper(&[("doc", "/docs/"), ("secret", "/docs/secret/")]);
        assert_eq!(mapper.canonical("/docs/secret/plan"), "secret");
        assert_eq!(mapper.canonical("/docs/public"), "doc");
    }
}
