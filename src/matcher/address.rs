use std::net::Ipv4Addr;

use super::{parse_subnet_list, PatternError, StringMatcher, Subnet};
use crate::rules::RuleList;
use crate::types::MatchType;

/// Subnets of one `ip_in_net` / `ip_not_in_net` rule
#[derive(Debug, Clone)]
pub struct SubnetGroup {
    pub subnets: Vec<Subnet>,
    pub index: usize,
}

impl SubnetGroup {
    /// Whether any subnet of the group contains `address`
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.subnets.iter().any(|s| s.contains(address))
    }
}

/// Rule matcher for the sender IP field.
///
/// Adds subnet membership rules on top of the string match types.
#[derive(Debug, Default)]
pub struct AddressMatcher {
    patterns: StringMatcher,
    in_subnets: Vec<SubnetGroup>,
    not_in_subnets: Vec<SubnetGroup>,
}

impl AddressMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the pattern of rule `index`. Subnet patterns are comma separated
    /// CIDR lists; one that does not parse is recorded in `errors`.
    pub fn add(
        &mut self,
        match_type: MatchType,
        pattern: &str,
        index: usize,
        errors: &mut Vec<PatternError<usize>>,
    ) {
        let groups = match match_type {
            MatchType::IpInNet => &mut self.in_subnets,
            MatchType::IpNotInNet => &mut self.not_in_subnets,
            _ => return self.patterns.add(match_type, pattern, index, errors),
        };

        match parse_subnet_list(pattern) {
            Ok(subnets) => groups.push(SubnetGroup { subnets, index }),
            Err(e) => errors.push(PatternError {
                index,
                pattern: pattern.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Match `value` and count a hit on every rule that fires.
    ///
    /// Subnet rules only apply when `value` is an IPv4 address. Each subnet
    /// rule counts at most once per call no matter how many of its subnets
    /// agree.
    pub fn matches(&self, inbound: bool, value: &str, rules: &mut RuleList) -> bool {
        self.matches_into(inbound, value, rules, &mut Vec::new())
    }

    /// Same as [`matches`](Self::matches) with a caller owned scratch buffer
    pub fn matches_into(
        &self,
        inbound: bool,
        value: &str,
        rules: &mut RuleList,
        hits: &mut Vec<usize>,
    ) -> bool {
        let mut matched = false;

        if let Ok(address) = value.trim().parse::<Ipv4Addr>() {
            for group in &self.in_subnets {
                if group.contains(address) {
                    rules.record_hit(group.index, inbound);
                    matched = true;
                }
            }
            for group in &self.not_in_subnets {
                if !group.contains(address) {
                    rules.record_hit(group.index, inbound);
                    matched = true;
                }
            }
        }

        self.patterns.matches_into(inbound, value, rules, hits) || matched
    }

    /// Number of subnet rules plus compiled string patterns
    pub fn pattern_count(&self) -> usize {
        self.in_subnets.len() + self.not_in_subnets.len() + self.patterns.pattern_count()
    }
}
