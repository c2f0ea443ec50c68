use tracing::debug;

use super::{
    Anchor, InvertedPatternMatcher, ListMatcher, Matcher, PatternError, PatternMatcher,
    PatternOptions,
};
use crate::error::AnalyzerError;
use crate::rules::RuleList;
use crate::types::MatchType;

/// Match types served by pattern sets, in query order
const PATTERN_MATCH_TYPES: [MatchType; 6] = [
    MatchType::Equal,
    MatchType::NotEqual,
    MatchType::Match,
    MatchType::NotMatch,
    MatchType::Regex,
    MatchType::NotRegex,
];

/// Build the pattern set matcher for a match type, `None` for match types
/// that are not served by pattern sets.
fn pattern_matcher(match_type: MatchType) -> Option<Matcher<usize>> {
    let matcher = match match_type {
        MatchType::Equal => {
            Matcher::Direct(PatternMatcher::new(PatternOptions::literal(Anchor::Both)))
        }
        MatchType::NotEqual => {
            Matcher::Inverted(InvertedPatternMatcher::new(PatternOptions::literal(Anchor::Both)))
        }
        MatchType::Match => {
            Matcher::Direct(PatternMatcher::new(PatternOptions::literal(Anchor::Unanchored)))
        }
        MatchType::NotMatch => Matcher::Inverted(InvertedPatternMatcher::new(
            PatternOptions::literal(Anchor::Unanchored),
        )),
        MatchType::Regex => {
            Matcher::Direct(PatternMatcher::new(PatternOptions::regex(Anchor::Unanchored)))
        }
        MatchType::NotRegex => Matcher::Inverted(InvertedPatternMatcher::new(
            PatternOptions::regex(Anchor::Unanchored),
        )),
        MatchType::IpInNet | MatchType::IpNotInNet | MatchType::IsInDomainSet => return None,
    };
    Some(matcher)
}

/// Rule matcher for one string field (host, HELO, senders, recipients).
///
/// Holds one pattern set per match type. Every rule whose pattern fires is
/// counted, so one value can hit many rules.
#[derive(Debug)]
pub struct StringMatcher {
    matchers: Vec<(MatchType, Matcher<usize>)>,
}

impl Default for StringMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StringMatcher {
    pub fn new() -> Self {
        Self {
            matchers: PATTERN_MATCH_TYPES
                .into_iter()
                .filter_map(|mt| pattern_matcher(mt).map(|m| (mt, m)))
                .collect(),
        }
    }

    /// Add the pattern of rule `index`.
    ///
    /// Compile failures are pushed onto `errors`. `is_in_domainset` is
    /// reserved and subnet match types do not apply here; both are ignored.
    pub fn add(
        &mut self,
        match_type: MatchType,
        pattern: &str,
        index: usize,
        errors: &mut Vec<PatternError<usize>>,
    ) {
        let Some((_, matcher)) = self.matchers.iter_mut().find(|(mt, _)| *mt == match_type)
        else {
            debug!(%match_type, index, "match type not handled by string matcher");
            return;
        };

        if let Err(e) = matcher.add(pattern, index) {
            let message = match e {
                AnalyzerError::InvalidPattern { message, .. } => message,
                other => other.to_string(),
            };
            errors.push(PatternError {
                index,
                pattern: pattern.to_string(),
                message,
            });
        }
    }

    /// Match `value` and count a hit on every rule that fires.
    pub fn matches(&self, inbound: bool, value: &str, rules: &mut RuleList) -> bool {
        self.matches_into(inbound, value, rules, &mut Vec::new())
    }

    /// Same as [`matches`](Self::matches), using `hits` as scratch space so
    /// a caller scanning many records allocates once.
    pub fn matches_into(
        &self,
        inbound: bool,
        value: &str,
        rules: &mut RuleList,
        hits: &mut Vec<usize>,
    ) -> bool {
        let mut matched = false;
        for (_, matcher) in &self.matchers {
            if matcher.pattern_count() == 0 {
                continue;
            }
            matched |= matcher.matches_into(value, hits);
            for &index in hits.iter() {
                rules.record_hit(index, inbound);
            }
        }
        matched
    }

    /// Indices of every rule that fires for `value`, without counting
    pub fn matching_rules(&self, value: &str) -> Vec<usize> {
        let mut all = Vec::new();
        let mut hits = Vec::new();
        for (_, matcher) in &self.matchers {
            if matcher.pattern_count() > 0 && matcher.matches_into(value, &mut hits) {
                all.extend_from_slice(&hits);
            }
        }
        all
    }

    /// Total number of compiled patterns
    pub fn pattern_count(&self) -> usize {
        self.matchers.iter().map(|(_, m)| m.pattern_count()).sum()
    }
}
