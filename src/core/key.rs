//! Variable keys.
//!
//! A [`Key`] is an opaque, totally ordered integer naming one optimization
//! variable. [`Symbol`] packs a character and an index into a key so that
//! problems can use readable names such as `x3` or `l12`.

use std::fmt;

/// Opaque unique identifier of a variable.
pub type Key = u64;

const CHAR_BITS: u32 = 8;
const INDEX_BITS: u32 = u64::BITS - CHAR_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// A character + index pair packed into a [`Key`].
///
/// The character occupies the top 8 bits, the index the remaining 56.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    chr: u8,
    index: u64,
}

impl Symbol {
    /// Create a symbol. Indices wider than 56 bits are truncated.
    pub fn new(chr: char, index: u64) -> Self {
        Self {
            chr: chr as u8,
            index: index & INDEX_MASK,
        }
    }

    /// Decode a symbol from a key.
    pub fn from_key(key: Key) -> Self {
        Self {
            chr: (key >> INDEX_BITS) as u8,
            index: key & INDEX_MASK,
        }
    }

    /// Encode this symbol as a key.
    pub fn key(&self) -> Key {
        ((self.chr as u64) << INDEX_BITS) | self.index
    }

    pub fn chr(&self) -> char {
        self.chr as char
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        symbol.key()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chr(), self.index)
    }
}

/// Shorthand for `Symbol::new(chr, index).key()`.
pub fn symbol(chr: char, index: u64) -> Key {
    Symbol::new(chr, index).key()
}

/// Format a key for messages: symbol keys print as `x3`, plain integers as-is.
pub fn format_key(key: Key) -> String {
    let symbol = Symbol::from_key(key);
    if symbol.chr.is_ascii_alphabetic() {
        symbol.to_string()
    } else {
        key.to_string()
    }
}
