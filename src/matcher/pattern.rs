use once_cell::sync::OnceCell;
use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use tracing::{debug, error};

use super::ListMatcher;
use crate::error::{AnalyzerError, Result};

/// Compiled size limit for a whole pattern set. Rule lists with tens of
/// thousands of entries exceed the regex crate defaults.
const SET_SIZE_LIMIT: usize = 512 * (1 << 20);
const SET_DFA_SIZE_LIMIT: usize = 64 * (1 << 20);

/// How pattern text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    /// Pattern is matched character for character
    Literal,
    /// Pattern is a regular expression
    Regex,
}

/// Where a pattern must match in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Whole input
    Both,
    /// Prefix of the input
    Start,
    /// Anywhere in the input
    Unanchored,
}

/// Options shared by every pattern of one matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    pub syntax: PatternSyntax,
    pub anchor: Anchor,
    pub case_sensitive: bool,
}

impl PatternOptions {
    /// Case-sensitive literal patterns
    pub fn literal(anchor: Anchor) -> Self {
        Self {
            syntax: PatternSyntax::Literal,
            anchor,
            case_sensitive: true,
        }
    }

    /// Case-sensitive regular expressions
    pub fn regex(anchor: Anchor) -> Self {
        Self {
            syntax: PatternSyntax::Regex,
            anchor,
            case_sensitive: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Translate a caller pattern into the regex source stored in the set
    fn source(&self, pattern: &str) -> String {
        let body = match self.syntax {
            PatternSyntax::Literal => regex::escape(pattern),
            PatternSyntax::Regex => pattern.to_string(),
        };
        match self.anchor {
            Anchor::Both => format!("^(?:{})$", body),
            Anchor::Start => format!("^(?:{})", body),
            Anchor::Unanchored => body,
        }
    }
}

/// Patterns of one matcher plus the slot to caller index mapping.
///
/// Compiled into a single `RegexSet` on the first query. After that the
/// set is sealed and `add` fails.
#[derive(Debug)]
struct PatternSet<I> {
    options: PatternOptions,
    sources: Vec<String>,
    slots: Vec<I>,
    compiled: OnceCell<Option<RegexSet>>,
}

impl<I: Copy> PatternSet<I> {
    fn new(options: PatternOptions) -> Self {
        Self {
            options,
            sources: Vec::new(),
            slots: Vec::new(),
            compiled: OnceCell::new(),
        }
    }

    fn add(&mut self, pattern: &str, index: I) -> Result<()> {
        if self.compiled.get().is_some() {
            return Err(AnalyzerError::MatcherSealed);
        }

        // Validate on its own so one bad pattern never poisons the set
        let source = self.options.source(pattern);
        RegexBuilder::new(&source)
            .case_insensitive(!self.options.case_sensitive)
            .build()
            .map_err(|e| AnalyzerError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        self.sources.push(source);
        self.slots.push(index);
        Ok(())
    }

    fn compiled(&self) -> Option<&RegexSet> {
        self.compiled
            .get_or_init(|| {
                if self.sources.is_empty() {
                    return None;
                }
                match RegexSetBuilder::new(&self.sources)
                    .case_insensitive(!self.options.case_sensitive)
                    .size_limit(SET_SIZE_LIMIT)
                    .dfa_size_limit(SET_DFA_SIZE_LIMIT)
                    .build()
                {
                    Ok(set) => {
                        debug!(patterns = self.sources.len(), "compiled pattern set");
                        Some(set)
                    }
                    Err(e) => {
                        error!(
                            patterns = self.sources.len(),
                            error = %e,
                            "failed to compile pattern set, its rules will never match"
                        );
                        None
                    }
                }
            })
            .as_ref()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Multi-pattern matcher returning the indices of every pattern that
/// matches the input.
#[derive(Debug)]
pub struct PatternMatcher<I> {
    set: PatternSet<I>,
}

impl<I: Copy> PatternMatcher<I> {
    pub fn new(options: PatternOptions) -> Self {
        Self {
            set: PatternSet::new(options),
        }
    }

    pub fn options(&self) -> PatternOptions {
        self.set.options
    }
}

impl<I: Copy> ListMatcher<I> for PatternMatcher<I> {
    fn add(&mut self, pattern: &str, index: I) -> Result<()> {
        self.set.add(pattern, index)
    }

    fn matches_into(&self, input: &str, hits: &mut Vec<I>) -> bool {
        hits.clear();
        if let Some(set) = self.set.compiled() {
            hits.extend(set.matches(input).into_iter().map(|slot| self.set.slots[slot]));
        }
        !hits.is_empty()
    }

    fn pattern_count(&self) -> usize {
        self.set.len()
    }
}

/// Multi-pattern matcher returning the indices of every pattern that does
/// NOT match the input. Models the `not_*` match types: a rule fires when
/// the field differs from its pattern.
#[derive(Debug)]
pub struct InvertedPatternMatcher<I> {
    set: PatternSet<I>,
}

impl<I: Copy> InvertedPatternMatcher<I> {
    pub fn new(options: PatternOptions) -> Self {
        Self {
            set: PatternSet::new(options),
        }
    }

    pub fn options(&self) -> PatternOptions {
        self.set.options
    }
}

impl<I: Copy> ListMatcher<I> for InvertedPatternMatcher<I> {
    fn add(&mut self, pattern: &str, index: I) -> Result<()> {
        self.set.add(pattern, index)
    }

    fn matches_into(&self, input: &str, hits: &mut Vec<I>) -> bool {
        hits.clear();
        if let Some(set) = self.set.compiled() {
            let matched = set.matches(input);
            hits.extend(
                self.set
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(slot, _)| !matched.matched(*slot))
                    .map(|(_, index)| *index),
            );
        }
        !hits.is_empty()
    }

    fn pattern_count(&self) -> usize {
        self.set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(options: PatternOptions, patterns: &[&str]) -> PatternMatcher<usize> {
        let mut m = PatternMatcher::new(options);
        for (i, p) in patterns.iter().enumerate() {
            m.add(p, i).unwrap();
        }
        m
    }

    fn inverted(options: PatternOptions, patterns: &[&str]) -> InvertedPatternMatcher<usize> {
        let mut m = InvertedPatternMatcher::new(options);
        for (i, p) in patterns.iter().enumerate() {
            m.add(p, i).unwrap();
        }
        m
    }

    #[test]
    fn test_literal_both_is_exact_equality() {
        let m = matcher(
            PatternOptions::literal(Anchor::Both),
            &["user@example.com", "a.b"],
        );
        assert_eq!(m.matches("user@example.com"), vec![0]);
        assert!(m.matches("xuser@example.com").is_empty());
        assert!(m.matches("user@example.comx").is_empty());
        assert!(m.matches("USER@example.com").is_empty(), "literal equality is case-sensitive");
        // '.' is not a wildcard in literal mode
        assert!(m.matches("axb").is_empty());
        assert_eq!(m.matches("a.b"), vec![1]);
    }

    #[test]
    fn test_literal_unanchored_is_substring() {
        let m = matcher(
            PatternOptions::literal(Anchor::Unanchored),
            &["example", "(test)"],
        );
        assert_eq!(m.matches("mail.example.com"), vec![0]);
        assert_eq!(m.matches("a (test) b"), vec![1]);
        assert!(m.matches("test").is_empty());
    }

    #[test]
    fn test_regex_unanchored() {
        let m = matcher(
            PatternOptions::regex(Anchor::Unanchored),
            &[r"^mail\d+\.", r"\.ru$", "spam"],
        );
        assert_eq!(m.matches("mail42.example.ru"), vec![0, 1]);
        assert_eq!(m.matches("nospamhere"), vec![2]);
        assert!(m.matches("example.com").is_empty());
    }

    #[test]
    fn test_start_anchor_is_prefix() {
        let m = matcher(PatternOptions::literal(Anchor::Start), &["moc.elpmaxe"]);
        assert!(m.is_match("moc.elpmaxe@bob"));
        assert!(!m.is_match("bob@example.com"));
    }

    #[test]
    fn test_case_insensitive_option() {
        let m = matcher(
            PatternOptions::literal(Anchor::Both).case_insensitive(),
            &["Example.COM"],
        );
        assert!(m.is_match("example.com"));
    }

    #[test]
    fn test_multiple_patterns_share_index() {
        let mut m = PatternMatcher::new(PatternOptions::literal(Anchor::Unanchored));
        m.add("foo", 7).unwrap();
        m.add("bar", 7).unwrap();
        assert_eq!(m.matches("foobar"), vec![7, 7]);
    }

    #[test]
    fn test_inverted_returns_complement() {
        let m = inverted(PatternOptions::literal(Anchor::Both), &["a", "b", "c"]);
        assert_eq!(m.matches("b"), vec![0, 2]);
        assert_eq!(m.matches("z"), vec![0, 1, 2]);
        assert!(m.is_match("b"), "at least one pattern failed to match");
    }

    #[test]
    fn test_inverted_single_pattern_is_negation() {
        let m = inverted(PatternOptions::literal(Anchor::Both), &["example.com"]);
        assert!(!m.is_match("example.com"));
        assert!(m.is_match("example.org"));
        assert!(m.is_match(""));
    }

    #[test]
    fn test_invalid_regex_does_not_abort_batch() {
        let mut m = PatternMatcher::new(PatternOptions::regex(Anchor::Unanchored));
        m.add("good", 0).unwrap();
        let err = m.add("bad(", 1).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidPattern { .. }));
        m.add("fine$", 2).unwrap();

        assert_eq!(m.pattern_count(), 2);
        assert_eq!(m.matches("good and fine"), vec![0, 2]);
    }

    #[test]
    fn test_add_after_query_is_rejected() {
        let mut m = PatternMatcher::new(PatternOptions::literal(Anchor::Both));
        m.add("one", 0).unwrap();
        assert!(m.is_match("one"));

        let err = m.add("two", 1).unwrap_err();
        assert!(matches!(err, AnalyzerError::MatcherSealed));
        assert_eq!(m.pattern_count(), 1);
    }

    #[test]
    fn test_empty_matchers_never_match() {
        let m: PatternMatcher<usize> = PatternMatcher::new(PatternOptions::regex(Anchor::Unanchored));
        assert!(m.matches("anything").is_empty());
        let m: InvertedPatternMatcher<usize> =
            InvertedPatternMatcher::new(PatternOptions::regex(Anchor::Unanchored));
        assert!(!m.is_match("anything"));
    }

    #[test]
    fn test_matches_into_reuses_buffer() {
        let m = matcher(PatternOptions::literal(Anchor::Unanchored), &["x"]);
        let mut hits = vec![99, 98];
        assert!(m.matches_into("xyz", &mut hits));
        assert_eq!(hits, vec![0]);
        assert!(!m.matches_into("abc", &mut hits));
        assert!(hits.is_empty());
    }
}
