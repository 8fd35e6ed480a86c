//! Symbol interning for identifier-heavy data.
//!
//! Product, module, and parameter names are compared and hashed constantly
//! during resolution. A `Symbol` is a `u32` index into a process-wide table,
//! so equality and hashing never touch the string data.

use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Default)]
struct SymbolTable {
    names: Vec<&'static str>,
    index: HashMap<&'static str, u32>,
}

static TABLE: LazyLock<RwLock<SymbolTable>> = LazyLock::new(|| RwLock::new(SymbolTable::default()));

/// An interned identifier.
///
/// Two symbols created from equal strings carry the same index, so `Eq` and
/// `Hash` operate on a single `u32`. `Ord` still compares the underlying
/// strings to keep iteration orders human-meaningful.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern a string, returning its symbol.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        // Fast path: already interned (read lock only)
        {
            let table = TABLE.read().unwrap();
            if let Some(&id) = table.index.get(s) {
                return Symbol(id);
            }
        }

        let mut table = TABLE.write().unwrap();

        // Double-check after acquiring the write lock
        if let Some(&id) = table.index.get(s) {
            return Symbol(id);
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        let id = table.names.len() as u32;
        table.names.push(leaked);
        table.index.insert(leaked, id);

        Symbol(id)
    }

    /// Resolve the symbol back to its string.
    pub fn as_str(&self) -> &'static str {
        TABLE.read().unwrap().names[self.0 as usize]
    }

    /// Check whether the interned string is empty.
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::new("")
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.0 == other.0 {
            std::cmp::Ordering::Equal
        } else {
            self.as_str().cmp(other.as_str())
        }
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(s)
    }
}

impl From<&String> for Symbol {
    fn from(s: &String) -> Self {
        Symbol::new(s)
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Symbol::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_symbol() {
        let a = Symbol::new("cpp");
        let b = Symbol::new("cpp");
        let c = Symbol::new("qt.core");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "cpp");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Symbol::new("alpha");
        let z = Symbol::new("zeta");

        assert!(a < z);
        assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Symbol::new("product"), 7);

        assert_eq!(map.get(&Symbol::new("product")), Some(&7));
    }
}
