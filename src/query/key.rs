use std::fmt::{self, Display};

/// One primitive component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => write!(f, "null"),
            KeyPart::Bool(b) => write!(f, "{b}"),
            KeyPart::Int(i) => write!(f, "{i}"),
            KeyPart::Str(s) => write!(f, "{s:?}"),
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

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::Str(s.clone())
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        KeyPart::Int(i)
    }
}

impl From<u32> for KeyPart {
    fn from(i: u32) -> Self {
        KeyPart::Int(i64::from(i))
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

/// Ordered tuple identifying one cacheable fetch, compared by deep equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Appends a part, builder style.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// `true` when every part of `prefix` equals the part at the same
    /// position in `self`. A key is a prefix of itself.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, "]")
    }
}

/// Builds a [`QueryKey`] from anything convertible into [`KeyPart`]s.
///
/// ```
/// use stockdash::query_key;
/// let key = query_key!["stock-prices", "AAPL", 2u32];
/// assert_eq!(key.to_string(), r#"["stock-prices", "AAPL", 2]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::query::QueryKey::new(vec![$($crate::query::KeyPart::from($part)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_compare_by_value() {
        let a = query_key!["stock-prices", "AAPL", 2u32];
        let b = query_key!["stock-prices", "AAPL".to_string(), 2i64];
        let c = query_key!["stock-prices", "AAPL", 30u32];
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(query_key!["account-summary", Some(1i64)], query_key!["account-summary", None::<i64>]);
    }

    #[test]
    fn test_prefix_matching() {
        let key = query_key!["stock-prices", "AAPL", "latest"];
        assert!(key.starts_with(&query_key!["stock-prices"]));
        assert!(key.starts_with(&query_key!["stock-prices", "AAPL"]));
        assert!(key.starts_with(&key.clone()));
        assert!(key.starts_with(&QueryKey::default()));
        assert!(!key.starts_with(&query_key!["stock-prices", "MSFT"]));
        assert!(!query_key!["stock"].starts_with(&query_key!["stock-prices"]));
    }

    #[test]
    fn test_display_and_builder() {
        let key = QueryKey::default().with("trades").with(7i64).with(None::<u32>).with(true);
        assert_eq!(key.to_string(), r#"["trades", 7, null, true]"#);
        assert_eq!(key.parts().len(), 4);
    }
}
