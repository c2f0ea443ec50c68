use std::fmt;
use std::str::FromStr;

/// Log field a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Sender IP address (`$ip`)
    Ip,
    /// Sender host name (`$host`)
    Host,
    /// SMTP HELO name (`$helo`)
    Helo,
    /// Recipients (`$rcpt`)
    Rcpt,
    /// Envelope sender (`$from`)
    From,
    /// Header From (`$hfrom`)
    HFrom,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::Ip,
        FieldType::Host,
        FieldType::Helo,
        FieldType::Rcpt,
        FieldType::From,
        FieldType::HFrom,
    ];

    /// Token used for this field type in rule list files
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Ip => "$ip",
            FieldType::Host => "$host",
            FieldType::Helo => "$helo",
            FieldType::Rcpt => "$rcpt",
            FieldType::From => "$from",
            FieldType::HFrom => "$hfrom",
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|ft| ft.as_str() == s)
            .ok_or_else(|| format!("unknown field type '{}'", s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison semantics of a rule pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Equal,
    NotEqual,
    Match,
    NotMatch,
    Regex,
    NotRegex,
    IpInNet,
    IpNotInNet,
    /// Reserved. Parsed and saved, never matched.
    IsInDomainSet,
}

impl MatchType {
    pub const ALL: [MatchType; 9] = [
        MatchType::Equal,
        MatchType::NotEqual,
        MatchType::Match,
        MatchType::NotMatch,
        MatchType::Regex,
        MatchType::NotRegex,
        MatchType::IpInNet,
        MatchType::IpNotInNet,
        MatchType::IsInDomainSet,
    ];

    /// Token used for this match type in rule list files
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "equal",
            MatchType::NotEqual => "not_equal",
            MatchType::Match => "match",
            MatchType::NotMatch => "not_match",
            MatchType::Regex => "regex",
            MatchType::NotRegex => "not_regex",
            MatchType::IpInNet => "ip_in_net",
            MatchType::IpNotInNet => "ip_not_in_net",
            MatchType::IsInDomainSet => "is_in_domainset",
        }
    }

    /// Whether the pattern is a subnet list rather than a string pattern
    pub fn is_subnet(&self) -> bool {
        matches!(self, MatchType::IpInNet | MatchType::IpNotInNet)
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchType::ALL
            .into_iter()
            .find(|mt| mt.as_str() == s)
            .ok_or_else(|| format!("unknown match type '{}'", s))
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hit index reported by per-user matchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserMatch {
    /// Index of the user in the user list
    pub user_index: usize,
    /// Index of the item in that user's safe or block list
    pub item_index: usize,
}

impl UserMatch {
    pub fn new(user_index: usize, item_index: usize) -> Self {
        Self {
            user_index,
            item_index,
        }
    }
}

impl fmt::Display for UserMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} item {}", self.user_index, self.item_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_tokens() {
        for ft in FieldType::ALL {
            assert_eq!(ft.as_str().parse::<FieldType>().unwrap(), ft);
        }
        assert_eq!("$hfrom".parse::<FieldType>().unwrap(), FieldType::HFrom);
    }

    #[test]
    fn test_field_type_is_case_sensitive() {
        assert!("$IP".parse::<FieldType>().is_err());
        assert!("ip".parse::<FieldType>().is_err());
        assert!("".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_match_type_tokens() {
        assert_eq!("not_regex".parse::<MatchType>().unwrap(), MatchType::NotRegex);
        assert_eq!(
            "is_in_domainset".parse::<MatchType>().unwrap(),
            MatchType::IsInDomainSet
        );
        assert!("contains".parse::<MatchType>().is_err());
    }

    #[test]
    fn test_match_type_is_subnet() {
        assert!(MatchType::IpInNet.is_subnet());
        assert!(MatchType::IpNotInNet.is_subnet());
        assert!(!MatchType::Equal.is_subnet());
        assert!(!MatchType::IsInDomainSet.is_subnet());
    }
}
