//! String interning.
//!
//! Every string that reaches a constant pool is interned: equal byte
//! sequences map to the same handle, and handle identity is the sole
//! equality test the compiler performs on strings. Handles own their
//! content, so they stay valid for as long as any `Proto` references them,
//! even after the interner itself is dropped.

use ahash::RandomState;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// Handle to an interned string.
///
/// Cloning is cheap (reference count bump). Equality and hashing go through
/// the allocation address, not the content; two handles compare equal iff
/// they came from the same [`StringInterner`] for the same byte sequence.
#[derive(Debug, Clone)]
pub struct LuaStr(Rc<str>);

impl LuaStr {
    /// View the underlying text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for LuaStr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LuaStr {}

impl Hash for LuaStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.as_ptr() as usize);
    }
}

impl Deref for LuaStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LuaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed string pool handing out [`LuaStr`] handles.
pub struct StringInterner {
    pool: HashSet<Rc<str>, RandomState>,
}

impl StringInterner {
    pub fn new() -> Self {
        StringInterner {
            pool: HashSet::with_capacity_and_hasher(64, RandomState::new()),
        }
    }

    /// Intern a string, returning the existing handle if the content was
    /// seen before.
    pub fn intern(&mut self, s: &str) -> LuaStr {
        if let Some(existing) = self.pool.get(s) {
            return LuaStr(existing.clone());
        }
        let rc: Rc<str> = Rc::from(s);
        self.pool.insert(rc.clone());
        LuaStr(rc)
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
