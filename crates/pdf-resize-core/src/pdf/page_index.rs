//! Page number newtype for the 1-based numbering lopdf uses.
//!
//! Progress counters and collections work with 0-based `usize` indices while
//! lopdf keys its page map by 1-based `u32` numbers. This type centralizes the
//! conversion between the two.

use std::fmt;

/// A 1-based page number, as used by lopdf's page map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageNumber(u32);

impl PageNumber {
    /// The first page of every document.
    pub const FIRST: Self = Self(1);

    /// Create a page number, returning `None` for zero.
    #[must_use]
    pub const fn new(number: u32) -> Option<Self> {
        if number == 0 { None } else { Some(Self(number)) }
    }

    /// Get the 1-based number for lopdf page lookups.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Convert a 0-based index into a page number.
    ///
    /// Returns `None` if the index is at or past `total_pages`, or does not
    /// fit lopdf's page number type.
    #[must_use]
    pub fn from_index(index: usize, total_pages: usize) -> Option<Self> {
        if index >= total_pages {
            return None;
        }
        let number = u32::try_from(index).ok()?.checked_add(1)?;
        Some(Self(number))
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
