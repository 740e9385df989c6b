// src/checker/assembler.rs - Merge matcher and scanner output into one result

use crate::types::{BlacklistEntry, CheckResult, MatchType, ScanOutcome, Severity};

/// Pure merge of the two evidence sources. Curated entries always win over
/// keyword signals; keyword severity follows the fixed class priority.
///
/// Bypassed-only hits apply one uniform rule: not blacklisted, flagged as a
/// possible false positive for human review, keywords retained as evidence.
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, entry: Option<&BlacklistEntry>, scan: &ScanOutcome) -> CheckResult {
        if let Some(entry) = entry {
            return CheckResult {
                is_blacklisted: true,
                matched_creator: Some(entry.name.clone()),
                category: Some(entry.category),
                reason: Some(entry.reason.clone()),
                flagged_by: Some(entry.flagged_by.clone()),
                discord_server_id: entry.discord_server_id.clone(),
                match_type: MatchType::Entry,
                matched_keywords: scan.matched_keywords(),
                severity: Some(entry.severity),
                possible_false_positive: false,
            };
        }

        let classes = scan.confirmed_classes();
        if !classes.is_empty() {
            let severity = classes.iter().map(|class| class.severity()).max();
            return CheckResult {
                is_blacklisted: true,
                match_type: MatchType::Keyword,
                matched_keywords: scan.matched_keywords(),
                severity,
                ..CheckResult::clean()
            };
        }

        if scan.has_hits() {
            // Every hit was exempted by a bypass token: review, not block.
            return CheckResult {
                match_type: MatchType::Keyword,
                matched_keywords: scan.matched_keywords(),
                severity: Some(Severity::Low),
                possible_false_positive: true,
                ..CheckResult::clean()
            };
        }

        CheckResult::clean()
    }

    /// Violation label for telemetry, highest-priority confirmed class.
    pub fn violation_type(&self, scan: &ScanOutcome) -> Option<String> {
        scan.confirmed_classes()
            .first()
            .map(|class| class.as_str().to_string())
    }
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new()
    }
}
