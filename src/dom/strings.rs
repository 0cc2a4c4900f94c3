//! String Pool with Zero-Copy Input References
//!
//! Storage for element names, attribute values and text content.
//!
//! Two storage modes:
//! - Input: a slice of the original document (zero-copy)
//! - Copied: strings that needed entity decoding or were written by a
//!   mutation, stored in the pool buffer
//!
//! Names go through `intern_ref`/`intern`, which deduplicate by hash. Text
//! values go through `push_ref`/`push`, which never deduplicate since
//! they are rarely repeated and can be large.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Entry type for string storage
#[derive(Debug, Clone, Copy)]
pub enum StringEntry<'a> {
    /// Slice of the original input
    Input(&'a str),
    /// Copied string: (offset_in_pool_data, length)
    Copied(u32, u32),
}

/// String pool over one input document
///
/// ID 0 is reserved for the empty string.
#[derive(Debug)]
pub struct StringPool<'a> {
    /// Entries indexed by string ID
    entries: Vec<StringEntry<'a>>,
    /// Buffer for copied strings only
    data: String,
    /// Hash of interned content -> IDs with that hash (handles rare collisions)
    hash_index: HashMap<u64, Vec<u32>>,
}

impl Default for StringPool<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> StringPool<'a> {
    /// Create a new empty string pool
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(256),
            data: String::with_capacity(1024),
            hash_index: HashMap::new(),
        };
        pool.entries.push(StringEntry::Input(""));
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    fn lookup(&self, hash: u64, s: &str) -> Option<u32> {
        self.hash_index
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| self.get(id) == s)
    }

    /// Intern a slice of the input (zero-copy, deduplicated)
    pub fn intern_ref(&mut self, s: &'a str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let hash = Self::compute_hash(s);
        if let Some(id) = self.lookup(hash, s) {
            return id;
        }
        let id = self.push_entry(StringEntry::Input(s));
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Intern a string by copying (deduplicated)
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let hash = Self::compute_hash(s);
        if let Some(id) = self.lookup(hash, s) {
            return id;
        }
        let id = self.push(s);
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Store a slice of the input without deduplication
    pub fn push_ref(&mut self, s: &'a str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        self.push_entry(StringEntry::Input(s))
    }

    /// Copy a string into the pool without deduplication
    pub fn push(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let offset = self.data.len() as u32;
        self.data.push_str(s);
        self.push_entry(StringEntry::Copied(offset, s.len() as u32))
    }

    fn push_entry(&mut self, entry: StringEntry<'a>) -> u32 {
        let id = self.entries.len() as u32;
        self.entries.push(entry);
        id
    }

    /// Get entry info for a string ID
    #[inline]
    pub fn get_entry(&self, id: u32) -> Option<StringEntry<'a>> {
        self.entries.get(id as usize).copied()
    }

    /// Get a string by ID; unknown IDs resolve to ""
    pub fn get(&self, id: u32) -> &str {
        match self.entries.get(id as usize) {
            Some(&StringEntry::Input(s)) => s,
            Some(&StringEntry::Copied(offset, len)) => {
                let start = offset as usize;
                self.data.get(start..start + len as usize).unwrap_or("")
            }
            None => "",
        }
    }

    /// Get the number of strings stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1 // Entry 0 is reserved
    }

    /// Get total bytes used for copied string storage
    pub fn bytes_used(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_ref_zero_copy() {
        let input = "<name>world</name>";
        let mut pool = StringPool::new();
        let id = pool.intern_ref(&input[6..11]);
        assert_eq!(pool.get(id), "world");
        assert!(matches!(pool.get_entry(id), Some(StringEntry::Input(_))));
        assert_eq!(pool.bytes_used(), 0);
    }

    #[test]
    fn test_intern_deduplicates_across_modes() {
        let input = "hello";
        let mut pool = StringPool::new();
        let id1 = pool.intern_ref(input);
        let id2 = pool.intern("hello");
        assert_eq!(id1, id2);
        assert_ne!(pool.intern("world"), id1);
    }

    #[test]
    fn test_push_never_deduplicates() {
        let mut pool = StringPool::new();
        let id1 = pool.push("value");
        let id2 = pool.push("value");
        assert_ne!(id1, id2);
        assert_eq!(pool.get(id2), "value");
    }

    #[test]
    fn test_empty_string() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), 0);
        assert_eq!(pool.push(""), 0);
        assert_eq!(pool.get(0), "");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let pool = StringPool::new();
        assert_eq!(pool.get(42), "");
    }
}
