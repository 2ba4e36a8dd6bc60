use nutype::nutype;
use std::collections::HashMap;

#[nutype]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// An interned string handle.
///
/// A `Sym` is a 4-byte stand-in for a string stored in a [`StringPool`].
/// Two `Sym`s compare equal exactly when the strings they were interned
/// from are equal, so hierarchy maps and per-type statistics can be keyed
/// by `Sym` instead of owned strings.
pub struct Sym(u32);

/// A canonicalization table for strings that repeat across millions of
/// GFF3 records (type names, biotypes, seqids, and the `ID`/`Parent`
/// linkage strings).
///
/// Each distinct string is stored once; [`StringPool::intern`] returns the
/// same [`Sym`] for every later occurrence, and [`StringPool::resolve`]
/// maps a [`Sym`] back to its string. Interning the linkage strings means
/// a child's `Parent` value shares storage with its parent's `ID`, which
/// is what keeps the id→node maps compact on genome-scale inputs.
pub struct StringPool {
    lookup: HashMap<Box<str>, Sym>,
    strings: Vec<Box<str>>,
}

impl StringPool {
    pub fn new() -> StringPool {
        StringPool {
            lookup: HashMap::with_capacity(1_0000),
            strings: Vec::with_capacity(1_0000),
        }
    }

    /// Returns the canonical [`Sym`] for `s`, inserting it on first sight.
    pub fn intern(&mut self, s: &str) -> Sym {
        if let Some(&sym) = self.lookup.get(s) {
            return sym;
        }
        let sym = Sym::new(self.strings.len() as u32);
        let owned: Box<str> = Box::from(s);
        self.strings.push(owned.clone());
        self.lookup.insert(owned, sym);
        sym
    }

    /// Maps a [`Sym`] back to the string it was interned from.
    ///
    /// # Panics
    ///
    /// Panics if `sym` was produced by a different pool.
    pub fn resolve(&self, sym: Sym) -> &str {
        &self.strings[sym.into_inner() as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        StringPool::new()
    }
}
