//! Mapping between logical paths and object keys
//!
//! Keys are built in two steps: the path is slugged into the store's key
//! alphabet, then namespaced under the configured prefix. Slugging is lossy,
//! so the adapter slugs on every operation rather than only on upload; the
//! slug of a slug is itself, which keeps listed keys addressable.

use adapter_core::AdapterConfig;

/// Join a prefix and a path into an object key
///
/// An empty prefix leaves the path untouched. Trailing `/` on the prefix is
/// trimmed first, so `uploads/` and `uploads` both yield `uploads/<path>`
/// rather than a doubled separator.
pub fn resolve_key(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), path)
    }
}

/// Lower-case `path` and replace characters outside `[a-z0-9/._-]` with `separator`
///
/// Consecutive replaced characters collapse into a single separator.
pub fn sanitize_for_store(path: &str, separator: char) -> String {
    let mut slug = String::with_capacity(path.len());
    let mut replacing = false;

    for c in path.chars().flat_map(char::to_lowercase) {
        if is_key_char(c) {
            slug.push(c);
            replacing = false;
        } else if !replacing {
            slug.push(separator);
            replacing = true;
        }
    }

    slug
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '/' | '.' | '-' | '_')
}

/// Prefix and separator bound together for one adapter instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    prefix: String,
    separator: char,
}

impl PathNormalizer {
    pub fn new(prefix: impl Into<String>, separator: char) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
            separator,
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.normalized_prefix(), config.slug_separator)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Slugged form of a logical path, without the prefix
    pub fn slug(&self, path: &str) -> String {
        sanitize_for_store(path.trim_start_matches('/'), self.separator)
    }

    /// Object key for a logical path
    pub fn object_key(&self, path: &str) -> String {
        resolve_key(&self.prefix, &self.slug(path))
    }

    /// Key prefix selecting everything inside directory `path`
    ///
    /// Always ends in `/` so that `docs` does not match `docs-old/`.
    /// The root directory selects the whole namespace.
    pub fn directory_prefix(&self, path: &str) -> String {
        let dir = path.trim_matches('/');
        if dir.is_empty() {
            return self.namespace_prefix();
        }
        format!("{}/", self.object_key(dir))
    }

    /// Key prefix covering every object owned by this adapter
    pub fn namespace_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }

    /// Logical path for a listed object key, or `None` if the key lies outside the namespace
    pub fn strip_prefix<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}
