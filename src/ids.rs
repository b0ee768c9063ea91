//! Small index types shared across the pipeline.
//!
//! Per the arena design note in `spec.md` §9: every cross-reference between
//! tokens, scopes, variables, functions and types is a 32-bit index into an
//! arena owned by the translation unit, never an owning pointer. This keeps
//! the token graph (doubly-linked list + bracket links + AST links) free of
//! reference-counting or lifetime gymnastics, and lets the whole arena drop
//! as a unit when the TU completes.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! index_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn from_index(i: usize) -> Self {
                Self(i as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_type!(TokenId);
index_type!(ScopeId);
index_type!(VariableId);
index_type!(FunctionId);
index_type!(TypeId);

/// Index into a translation unit's `file-list`; 0 is always the primary TU
/// file, nonzero indices are included headers (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileIndex(pub u32);

impl FileIndex {
    pub const PRIMARY: FileIndex = FileIndex(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
