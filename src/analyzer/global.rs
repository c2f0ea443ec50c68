use std::io::Read;
use std::path::Path;
use std::time::Instant;

use csv::StringRecord;
use tracing::{debug, info, warn};

use super::{header_from_address, is_inbound, FileSummary};
use crate::error::Result;
use crate::matcher::{AddressMatcher, PatternError, StringMatcher};
use crate::records::{Columns, LogReader};
use crate::rules::RuleList;
use crate::types::FieldType;

/// Log columns the global analyzer reads
pub const GLOBAL_COLUMNS: [&str; 7] = [
    "Policy_Route",
    "Sender_IP_Address",
    "Sender_Host",
    "HELO",
    "Header_From",
    "Sender",
    "Recipients",
];

const POLICY_ROUTE: usize = 0;
const SENDER_IP: usize = 1;
const SENDER_HOST: usize = 2;
const HELO: usize = 3;
const HEADER_FROM: usize = 4;
const SENDER: usize = 5;
const RECIPIENTS: usize = 6;

/// Classifier for the organization rule list.
///
/// One matcher per log field. Rules are addressed by their position in the
/// [`RuleList`] they were built from, so the same list must be passed to
/// [`process`](Self::process).
#[derive(Debug, Default)]
pub struct GlobalAnalyzer {
    ip: AddressMatcher,
    host: StringMatcher,
    helo: StringMatcher,
    hfrom: StringMatcher,
    from: StringMatcher,
    rcpt: StringMatcher,
}

impl GlobalAnalyzer {
    /// Build the field matchers from `rules`. Patterns that fail to compile
    /// are returned; their rules never match.
    pub fn new(rules: &RuleList) -> (Self, Vec<PatternError<usize>>) {
        let mut analyzer = Self::default();
        let mut errors = Vec::new();

        for (index, entry) in rules.iter().enumerate() {
            let pattern = entry.pattern.as_str();
            let match_type = entry.match_type;
            match entry.field_type {
                FieldType::Ip => analyzer.ip.add(match_type, pattern, index, &mut errors),
                FieldType::Host => analyzer.host.add(match_type, pattern, index, &mut errors),
                FieldType::Helo => analyzer.helo.add(match_type, pattern, index, &mut errors),
                FieldType::HFrom => analyzer.hfrom.add(match_type, pattern, index, &mut errors),
                FieldType::From => analyzer.from.add(match_type, pattern, index, &mut errors),
                FieldType::Rcpt => analyzer.rcpt.add(match_type, pattern, index, &mut errors),
            }
        }

        debug!(
            rules = rules.len(),
            patterns = analyzer.pattern_count(),
            errors = errors.len(),
            "global analyzer built"
        );
        (analyzer, errors)
    }

    /// Classify every record of a log file, counting hits into `rules`.
    pub fn process(&self, path: impl AsRef<Path>, rules: &mut RuleList) -> Result<FileSummary> {
        let path = path.as_ref();
        let log = LogReader::open(path, &GLOBAL_COLUMNS)?;
        self.process_log(log, path, rules)
    }

    /// Classify every record read from `reader`.
    pub fn process_reader<R: Read>(&self, reader: R, rules: &mut RuleList) -> Result<FileSummary> {
        let log = LogReader::from_reader(reader, &GLOBAL_COLUMNS)?;
        self.process_log(log, Path::new("<reader>"), rules)
    }

    fn process_log<R: Read>(
        &self,
        mut log: LogReader<R>,
        path: &Path,
        rules: &mut RuleList,
    ) -> Result<FileSummary> {
        let start = Instant::now();
        let mut summary = FileSummary {
            path: path.to_path_buf(),
            records: 0,
            skipped: 0,
            header_found: false,
            elapsed: Default::default(),
        };

        let Some(columns) = log
            .header()
            .and_then(|h| Columns::resolve(h, &GLOBAL_COLUMNS))
        else {
            warn!(path = %path.display(), "no header found, skipping file");
            summary.skipped = log.skipped();
            summary.elapsed = start.elapsed();
            return Ok(summary);
        };
        summary.header_found = true;

        let mut record = StringRecord::new();
        let mut hits = Vec::new();
        while log.next_record(&mut record) {
            self.classify(&columns, &record, rules, &mut hits);
            summary.records += 1;
        }

        summary.skipped = log.skipped();
        summary.elapsed = start.elapsed();
        info!(
            path = %path.display(),
            records = summary.records,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "log file processed"
        );
        Ok(summary)
    }

    fn classify(
        &self,
        columns: &Columns<7>,
        record: &StringRecord,
        rules: &mut RuleList,
        hits: &mut Vec<usize>,
    ) {
        let inbound = is_inbound(columns.get(record, POLICY_ROUTE));
        let header_from = header_from_address(columns.get(record, HEADER_FROM));

        self.ip
            .matches_into(inbound, columns.get(record, SENDER_IP), rules, hits);
        self.host
            .matches_into(inbound, columns.get(record, SENDER_HOST), rules, hits);
        self.helo
            .matches_into(inbound, columns.get(record, HELO), rules, hits);
        self.hfrom.matches_into(inbound, header_from, rules, hits);
        self.from
            .matches_into(inbound, columns.get(record, SENDER), rules, hits);
        self.rcpt
            .matches_into(inbound, columns.get(record, RECIPIENTS), rules, hits);
    }

    /// Total number of compiled patterns and subnet rules
    pub fn pattern_count(&self) -> usize {
        self.ip.pattern_count()
            + self.host.pattern_count()
            + self.helo.pattern_count()
            + self.hfrom.pattern_count()
            + self.from.pattern_count()
            + self.rcpt.pattern_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Policy_Route,Sender_IP_Address,Sender_Host,HELO,Header_From,Sender,Recipients\n";

    fn rules(text: &str) -> RuleList {
        let (list, errors) = RuleList::from_reader(text.as_bytes()).unwrap();
        assert!(errors.is_empty(), "unexpected entry errors: {:?}", errors);
        list
    }

    fn run(rule_text: &str, log_text: &str) -> (RuleList, FileSummary) {
        let mut list = rules(rule_text);
        let (analyzer, errors) = GlobalAnalyzer::new(&list);
        assert!(errors.is_empty(), "unexpected pattern errors: {:?}", errors);
        let summary = analyzer
            .process_reader(log_text.as_bytes(), &mut list)
            .unwrap();
        (list, summary)
    }

    #[test]
    fn test_ip_in_net_inbound() {
        let log = format!(
            "{}default_inbound,10.0.0.5,mx.example.com,mx,a@example.com,a@example.com,b@corp.example\n",
            HEADER
        );
        let (list, summary) = run("$ip,ip_in_net,10.0.0.0/24,,0,0\n", &log);
        assert!(summary.header_found);
        assert_eq!(summary.records, 1);
        let rule = list.get(0).unwrap();
        assert_eq!(rule.inbound, 1);
        assert_eq!(rule.outbound, 0);
    }

    #[test]
    fn test_outbound_direction() {
        let log = format!(
            "{}default_outbound,10.0.0.5,host,helo,a@x.com,a@x.com,b@y.com\n",
            HEADER
        );
        let (list, _) = run("$ip,ip_in_net,10.0.0.0/24,,0,0\n", &log);
        assert_eq!(list.get(0).unwrap().inbound, 0);
        assert_eq!(list.get(0).unwrap().outbound, 1);
    }

    #[test]
    fn test_fields_routed_to_their_rules() {
        let rule_text = "\
            $host,equal,mx.example.com,,0,0\n\
            $helo,match,helo-name,,0,0\n\
            $hfrom,equal,boss@example.com,,0,0\n\
            $from,regex,^bounce@,,0,0\n\
            $rcpt,match,corp.example,,0,0\n\
            $host,equal,helo-name,,0,0\n";
        let log = format!(
            "{}default_inbound,1.2.3.4,mx.example.com,my-helo-name,\"The Boss <boss@example.com>\",bounce@example.com,\"a@corp.example,b@corp.example\"\n",
            HEADER
        );
        let (list, _) = run(rule_text, &log);
        let inbound: Vec<u64> = list.iter().map(|r| r.inbound).collect();
        assert_eq!(inbound, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_invalid_utf8_field_does_not_lose_record() {
        let mut list = rules("$ip,ip_in_net,10.0.0.0/24,,0,0\n$hfrom,equal,j@x.com,,0,0\n");
        let (analyzer, _) = GlobalAnalyzer::new(&list);

        let mut log = HEADER.as_bytes().to_vec();
        log.extend_from_slice(
            b"default_inbound,10.0.0.5,mx.example.com,mx,\"Jos\xe9 <j@x.com>\",j@x.com,r@y.com\n",
        );
        let summary = analyzer.process_reader(log.as_slice(), &mut list).unwrap();

        assert_eq!(summary.records, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(list.get(0).unwrap().inbound, 1);
        assert_eq!(list.get(1).unwrap().inbound, 1, "address still extracted from header");
    }

    #[test]
    fn test_header_after_preamble_and_reordered_columns() {
        let log = "Report,Mail\n\
            Recipients,Sender,Header_From,HELO,Sender_Host,Sender_IP_Address,Policy_Route\n\
            r@y.com,s@x.com,s@x.com,helo,host,192.168.1.1,default_inbound\n";
        let (list, summary) = run("$ip,equal,192.168.1.1,,0,0\n", log);
        assert_eq!(summary.records, 1);
        assert_eq!(list.get(0).unwrap().inbound, 1);
    }

    #[test]
    fn test_missing_header_processes_nothing() {
        let log = "Sender,Recipients\na@x.com,b@y.com\n";
        let (list, summary) = run("$from,match,x.com,,0,0\n", log);
        assert!(!summary.header_found);
        assert_eq!(summary.records, 0);
        assert_eq!(list.inbound_total() + list.outbound_total(), 0);
    }

    #[test]
    fn test_invalid_regex_reported_other_rules_work() {
        let mut list = rules("$host,regex,([bad,,0,0\n$host,match,good,,0,0\n");
        let (analyzer, errors) = GlobalAnalyzer::new(&list);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 0);

        let log = format!("{}default_inbound,1.1.1.1,good.host,h,a@b.c,a@b.c,r@s.t\n", HEADER);
        analyzer.process_reader(log.as_bytes(), &mut list).unwrap();
        assert_eq!(list.get(1).unwrap().inbound, 1);
    }

    #[test]
    fn test_domainset_rules_never_match() {
        let log = format!("{}default_inbound,1.1.1.1,host,h,a@b.c,a@b.c,r@s.t\n", HEADER);
        let (list, _) = run("$host,is_in_domainset,anything,,0,0\n", &log);
        assert_eq!(list.get(0).unwrap().inbound, 0);
    }
}
