mod address;
mod pattern;
mod string;
mod subnet;

use std::fmt;

pub use address::{AddressMatcher, SubnetGroup};
pub use pattern::{Anchor, InvertedPatternMatcher, PatternMatcher, PatternOptions, PatternSyntax};
pub use string::StringMatcher;
pub use subnet::{parse_subnet_list, ByteOrder, Subnet};

use crate::error::Result;

/// Trait for multi-pattern matchers keyed by a caller supplied hit index
pub trait ListMatcher<I> {
    /// Add a pattern reported back as `index` when it fires
    fn add(&mut self, pattern: &str, index: I) -> Result<()>;

    /// Replace the contents of `hits` with the indices that fire for
    /// `input`; returns whether any did
    fn matches_into(&self, input: &str, hits: &mut Vec<I>) -> bool;

    /// Number of patterns successfully added
    fn pattern_count(&self) -> usize;

    /// Indices that fire for `input`
    fn matches(&self, input: &str) -> Vec<I> {
        let mut hits = Vec::new();
        self.matches_into(input, &mut hits);
        hits
    }

    fn is_match(&self, input: &str) -> bool {
        !self.matches(input).is_empty()
    }
}

/// Enum wrapper for the matcher variants
#[derive(Debug)]
pub enum Matcher<I> {
    Direct(PatternMatcher<I>),
    Inverted(InvertedPatternMatcher<I>),
}

impl<I: Copy> ListMatcher<I> for Matcher<I> {
    fn add(&mut self, pattern: &str, index: I) -> Result<()> {
        match self {
            Matcher::Direct(m) => m.add(pattern, index),
            Matcher::Inverted(m) => m.add(pattern, index),
        }
    }

    fn matches_into(&self, input: &str, hits: &mut Vec<I>) -> bool {
        match self {
            Matcher::Direct(m) => m.matches_into(input, hits),
            Matcher::Inverted(m) => m.matches_into(input, hits),
        }
    }

    fn pattern_count(&self) -> usize {
        match self {
            Matcher::Direct(m) => m.pattern_count(),
            Matcher::Inverted(m) => m.pattern_count(),
        }
    }
}

/// A pattern that could not be compiled. The rule it belongs to never
/// matches; everything else keeps working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError<I> {
    pub index: I,
    pub pattern: String,
    pub message: String,
}

impl<I: fmt::Display> fmt::Display for PatternError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Pattern: {} Reason: {}",
            self.index, self.pattern, self.message
        )
    }
}
