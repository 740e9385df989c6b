// src/checker/normalizer.rs - Canonicalize raw input before matching

use log::debug;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::rules::RuleStore;
use crate::types::{CheckError, DiscordId, NormalizedInput};

/// Invite forms operators paste: discord.gg/<code> and the long
/// discord.com/invite/<code> variant. Codes are case-sensitive.
const INVITE_PATTERN: &str = r"(?i:discord\.gg/|discord\.com/invite/)([A-Za-z0-9-]+)";

pub struct InputNormalizer {
    invite_re: Regex,
}

impl InputNormalizer {
    pub fn new() -> Self {
        Self {
            invite_re: Regex::new(INVITE_PATTERN).expect("invite pattern compiles"),
        }
    }

    /// Canonicalize one raw query into the form the matcher and scanner
    /// consume. URL-like input that fails to parse is a user error, not a
    /// crash; bare names that fail URL synthesis simply carry no URL.
    pub fn normalize(&self, raw: &str, rules: &RuleStore) -> Result<NormalizedInput, CheckError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CheckError::InvalidInput {
                input: raw.to_string(),
                reason: "empty input".to_string(),
            });
        }

        // Undo the cheap evasion layers before any matching: percent
        // encoding, then compatibility-fold the unicode and lowercase.
        let decoded = match urlencoding::decode(trimmed) {
            Ok(cow) => cow.into_owned(),
            Err(_) => trimmed.to_string(),
        };
        let folded = decoded.nfkc().collect::<String>().to_lowercase();

        // Invite codes are case-sensitive, so extract from the decoded
        // text rather than the folded copy.
        let discord_id = self.extract_discord_id(&decoded, rules);

        let url_like = folded.contains("http") || folded.contains('.');
        let (normalized_url, domain) = if url_like {
            let candidate = if folded.starts_with("http://") || folded.starts_with("https://") {
                folded.clone()
            } else {
                format!("https://{}", folded)
            };
            match Url::parse(&candidate) {
                Ok(url) => {
                    let domain = host_domain(&url);
                    (Some(url), domain)
                }
                Err(e) => {
                    return Err(CheckError::InvalidInput {
                        input: trimmed.to_string(),
                        reason: format!("unparseable url: {}", e),
                    });
                }
            }
        } else {
            // Bare name: synthesize a URL so link matching still runs.
            match Url::parse(&format!("https://{}", folded)) {
                Ok(url) => {
                    let domain = host_domain(&url);
                    (Some(url), domain)
                }
                Err(_) => (None, None),
            }
        };

        debug!(
            "normalized '{}': domain={:?} discord={:?}",
            trimmed, domain, discord_id
        );

        Ok(NormalizedInput {
            raw_text: trimmed.to_string(),
            folded_text: folded,
            normalized_url,
            domain,
            discord_id,
        })
    }

    fn extract_discord_id(&self, text: &str, rules: &RuleStore) -> Option<DiscordId> {
        let code = self
            .invite_re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())?;

        match rules.resolve_invite(&code) {
            Some(id) => Some(DiscordId::Resolved(id)),
            None => Some(DiscordId::Invite(code)),
        }
    }
}

impl Default for InputNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn host_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
}
