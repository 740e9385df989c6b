// src/checker/matcher.rs - Match normalized input against curated entries

use log::debug;

use crate::rules::RuleStore;
use crate::types::{BlacklistEntry, NormalizedInput};

/// Names at or below this length are too likely to appear inside unrelated
/// text, so the name-containment rule skips them.
const MIN_NAME_MATCH_LEN: usize = 4;

/// Compares normalized input against the curated entry list.
///
/// Precedence is fixed so results stay deterministic: links, then the
/// entry's search keyword, then the Discord identifier, then a guarded
/// name-containment fallback. First hit wins.
pub struct BlacklistMatcher;

impl BlacklistMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn find_entry<'a>(
        &self,
        input: &NormalizedInput,
        rules: &'a RuleStore,
    ) -> Option<&'a BlacklistEntry> {
        if let Some(entry) = self.match_by_link(input, rules) {
            debug!("matched '{}' by link", entry.name);
            return Some(entry);
        }
        if let Some(entry) = self.match_by_keyword(input, rules) {
            debug!("matched '{}' by keyword", entry.name);
            return Some(entry);
        }
        if let Some(entry) = self.match_by_discord_id(input, rules) {
            debug!("matched '{}' by discord id", entry.name);
            return Some(entry);
        }
        if let Some(entry) = self.match_by_name(input, rules) {
            debug!("matched '{}' by name containment", entry.name);
            return Some(entry);
        }
        None
    }

    fn match_by_link<'a>(
        &self,
        input: &NormalizedInput,
        rules: &'a RuleStore,
    ) -> Option<&'a BlacklistEntry> {
        rules.entries.iter().find(|entry| {
            entry.links.iter().any(|link| {
                let link = link.trim().trim_end_matches('/').to_lowercase();
                if link.is_empty() {
                    return false;
                }
                if let Some(domain) = &input.domain {
                    if link.contains(domain.as_str()) {
                        return true;
                    }
                }
                if let Some(url) = &input.normalized_url {
                    let url = url.as_str().trim_end_matches('/').to_lowercase();
                    if url.contains(&link) || link.contains(&url) {
                        return true;
                    }
                }
                false
            })
        })
    }

    fn match_by_keyword<'a>(
        &self,
        input: &NormalizedInput,
        rules: &'a RuleStore,
    ) -> Option<&'a BlacklistEntry> {
        rules
            .entries
            .iter()
            .find(|entry| !entry.keyword.is_empty() && input.folded_text.contains(&entry.keyword))
    }

    fn match_by_discord_id<'a>(
        &self,
        input: &NormalizedInput,
        rules: &'a RuleStore,
    ) -> Option<&'a BlacklistEntry> {
        let input_id = input.discord_id.as_ref()?;
        rules.entries.iter().find(|entry| {
            entry
                .discord_server_id
                .as_ref()
                .is_some_and(|entry_id| entry_id.matches(input_id))
        })
    }

    fn match_by_name<'a>(
        &self,
        input: &NormalizedInput,
        rules: &'a RuleStore,
    ) -> Option<&'a BlacklistEntry> {
        rules.entries.iter().find(|entry| {
            entry.name.chars().count() >= MIN_NAME_MATCH_LEN
                && input.folded_text.contains(&entry.name.to_lowercase())
        })
    }
}

impl Default for BlacklistMatcher {
    fn default() -> Self {
        Self::new()
    }
}
