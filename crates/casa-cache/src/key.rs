//! Cache key composition.
//!
//! Keys are `prefix:part1:part2:...`. Parts that are "empty" (empty strings,
//! `false`, zero, `None`) are dropped before joining, so optional filters
//! that are not set do not change the key.

use serde::{Deserialize, Serialize};

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// A cache key uniquely identifying a cached computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from a raw string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Start building a key under `prefix`.
    pub fn builder(prefix: impl Into<String>) -> CacheKeyBuilder {
        CacheKeyBuilder::new(prefix)
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource prefix (everything before the first separator).
    pub fn prefix(&self) -> &str {
        self.0.split(KEY_SEPARATOR).next().unwrap_or_default()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A value that can appear as a key segment.
///
/// Returns `None` for values that should be left out of the key.
pub trait KeyPart {
    fn key_segment(&self) -> Option<String>;
}

impl KeyPart for str {
    fn key_segment(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl KeyPart for String {
    fn key_segment(&self) -> Option<String> {
        self.as_str().key_segment()
    }
}

impl KeyPart for bool {
    fn key_segment(&self) -> Option<String> {
        self.then(|| "true".to_string())
    }
}

macro_rules! impl_key_part_int {
    ($($t:ty),*) => {
        $(
            impl KeyPart for $t {
                fn key_segment(&self) -> Option<String> {
                    (*self != 0).then(|| self.to_string())
                }
            }
        )*
    };
}

impl_key_part_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl KeyPart for f64 {
    fn key_segment(&self) -> Option<String> {
        (*self != 0.0 && !self.is_nan()).then(|| self.to_string())
    }
}

impl<T: KeyPart> KeyPart for Option<T> {
    fn key_segment(&self) -> Option<String> {
        self.as_ref().and_then(KeyPart::key_segment)
    }
}

impl<T: KeyPart + ?Sized> KeyPart for &T {
    fn key_segment(&self) -> Option<String> {
        (**self).key_segment()
    }
}

/// Builder for composing cache keys.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefix: String,
    parts: Vec<String>,
}

impl CacheKeyBuilder {
    /// Create a new builder for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            parts: Vec::new(),
        }
    }

    /// Append a segment; empty values are skipped.
    pub fn part<P: KeyPart + ?Sized>(mut self, part: &P) -> Self {
        if let Some(segment) = part.key_segment() {
            self.parts.push(segment);
        }
        self
    }

    /// Build the key.
    pub fn build(self) -> CacheKey {
        let mut key = self.prefix;
        for part in self.parts {
            key.push(KEY_SEPARATOR);
            key.push_str(&part);
        }
        CacheKey(key)
    }
}

/// Build a `CacheKey` from a prefix and any number of parts.
///
/// # Example
///
/// ```
/// use casa_cache::cache_key;
///
/// let key = cache_key!("products", "list", 1, 20, "chairs", true);
/// assert_eq!(key.as_str(), "products:list:1:20:chairs:true");
///
/// let category: Option<&str> = None;
/// let key = cache_key!("products", "list", 1, 20, category);
/// assert_eq!(key.as_str(), "products:list:1:20");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($prefix:expr $(, $part:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut builder = $crate::CacheKeyBuilder::new($prefix);
        $(
            builder = builder.part(&$part);
        )*
        builder.build()
    }};
}
