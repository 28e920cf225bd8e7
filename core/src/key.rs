//! Structural cache keys.
//!
//! A `QueryKey` is an ordered tuple of parts, compared part by part. The
//! first part names the resource kind; invalidation matches keys by prefix,
//! so `["products"]` covers every page of every category.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Null,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{s:?}"),
            KeyPart::Int(n) => write!(f, "{n}"),
            KeyPart::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        KeyPart::Int(i64::from(n))
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(kind: &str) -> Self {
        Self(vec![KeyPart::from(kind)])
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Prefix of every product listing page.
    pub fn products() -> Self {
        Self::new("products")
    }

    pub fn products_page(page: u32, category: Option<&str>) -> Self {
        Self::products().with(page).with(category)
    }

    pub fn product(id: &str) -> Self {
        Self::new("product").with(id)
    }

    pub fn reviews(product_id: &str) -> Self {
        Self::new("reviews").with(product_id)
    }

    /// Prefix of every search result.
    pub fn searches() -> Self {
        Self::new("search")
    }

    pub fn search(text: &str) -> Self {
        Self::searches().with(text)
    }

    pub fn categories() -> Self {
        Self::new("categories")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}
