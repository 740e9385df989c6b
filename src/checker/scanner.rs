// src/checker/scanner.rs - Keyword violation scanning with bypass and
// contextual-pattern disambiguation

use log::debug;

use crate::rules::RuleStore;
use crate::types::{NormalizedInput, ScanOutcome};

/// Scans folded input text for IP- and COC-violation keywords.
///
/// Single suspicious words are common in legitimate resource names, so a
/// contextual token never confirms alone; it only counts when its paired
/// term is present too. Bypass tokens mark a known-legitimate naming
/// convention: hits are kept as evidence but stop confirming a violation.
pub struct KeywordScanner;

impl KeywordScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, input: &NormalizedInput, rules: &RuleStore) -> ScanOutcome {
        let text = input.folded_text.as_str();

        if let Some(token) = rules
            .whitelist
            .iter()
            .find(|w| text.contains(w.as_str()))
        {
            debug!("whitelist token '{}' present, keyword scan suppressed", token);
            return ScanOutcome::suppressed();
        }

        let ip_hits: Vec<String> = rules
            .ip_violation
            .iter()
            .filter(|t| !t.requires_context && text.contains(&t.text))
            .map(|t| t.text.clone())
            .collect();
        let ip_bypassed =
            !ip_hits.is_empty() && rules.ip_bypass.iter().any(|t| text.contains(&t.text));

        let coc_direct_hits: Vec<String> = rules
            .coc_violation
            .iter()
            .filter(|t| !t.requires_context && text.contains(&t.text))
            .map(|t| t.text.clone())
            .collect();

        // Contextual tokens only count through a fully present pair.
        let mut coc_contextual_hits: Vec<String> = Vec::new();
        for pattern in &rules.contextual_patterns {
            if pattern.confirmed_by(text) {
                for keyword in [&pattern.a, &pattern.b] {
                    if !coc_contextual_hits.contains(keyword) {
                        coc_contextual_hits.push(keyword.clone());
                    }
                }
            }
        }

        let coc_bypassed = (!coc_direct_hits.is_empty() || !coc_contextual_hits.is_empty())
            && rules.coc_bypass.iter().any(|t| text.contains(&t.text));

        let outcome = ScanOutcome {
            whitelisted: false,
            ip_hits,
            ip_bypassed,
            coc_direct_hits,
            coc_contextual_hits,
            coc_bypassed,
        };
        if outcome.has_hits() {
            debug!(
                "keyword scan hits={:?} ip_bypassed={} coc_bypassed={}",
                outcome.matched_keywords(),
                outcome.ip_bypassed,
                outcome.coc_bypassed
            );
        }
        outcome
    }
}

impl Default for KeywordScanner {
    fn default() -> Self {
        Self::new()
    }
}
