// src/types/mod.rs - Core data model for the compliance checker

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Severity of a blacklist entry or keyword violation, ordered low to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse used by the rule loader; rule files are hand-edited.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Display grouping for blacklist entries. Constrains nothing structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Discord,
    Tebex,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Discord => "discord",
            Category::Tebex => "tebex",
            Category::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "discord" => Some(Category::Discord),
            "tebex" => Some(Category::Tebex),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

/// How a check result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Matched a curated blacklist entry (ground truth).
    Entry,
    /// Matched violation keywords only (automatic, unverified signal).
    Keyword,
    /// No match at all.
    None,
}

/// Discord server identity as operators were able to record it.
///
/// Some entries carry a resolved numeric snowflake, others only the invite
/// code that was observed. Both forms round-trip through the rule files as
/// plain strings, with `invite:<code>` tagging the unresolved form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiscordId {
    /// Resolved numeric server snowflake.
    Resolved(String),
    /// Invite code only; the server id was never resolved.
    Invite(String),
}

impl DiscordId {
    /// The bare identifier with any `invite:` tag stripped. Both sides of a
    /// comparison are normalized through this before matching.
    pub fn key(&self) -> &str {
        match self {
            DiscordId::Resolved(id) => id,
            DiscordId::Invite(code) => code,
        }
    }

    pub fn matches(&self, other: &DiscordId) -> bool {
        self.key() == other.key()
    }
}

impl From<String> for DiscordId {
    fn from(raw: String) -> Self {
        match raw.strip_prefix("invite:") {
            Some(code) => DiscordId::Invite(code.to_string()),
            None => DiscordId::Resolved(raw),
        }
    }
}

impl From<DiscordId> for String {
    fn from(id: DiscordId) -> Self {
        match id {
            DiscordId::Resolved(id) => id,
            DiscordId::Invite(code) => format!("invite:{}", code),
        }
    }
}

/// One curated blacklist record for a creator, resource, or server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Display name; not guaranteed unique.
    pub name: String,
    /// Known URLs, insertion order preserved for display.
    pub links: Vec<String>,
    /// Free text, may be a comma-joined list of reason tags.
    pub reason: String,
    pub severity: Severity,
    pub category: Category,
    /// Primary search token.
    pub keyword: String,
    /// Attribution, not identity-verified.
    pub flagged_by: String,
    pub discord_server_id: Option<DiscordId>,
    /// Normalized at ingestion; rule files carry several date formats.
    pub blacklisted_since: Option<NaiveDate>,
}

/// A single violation keyword. Contextual tokens never confirm a violation
/// on their own; they only count toward a [`ContextualPattern`] pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub requires_context: bool,
}

impl Token {
    /// Parse the rule-file form. A trailing colon marks a contextual-only
    /// token (`"child:"`); the colon is stripped here.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.strip_suffix(':') {
            Some(text) => Token {
                text: text.to_lowercase(),
                requires_context: true,
            },
            None => Token {
                text: trimmed.to_lowercase(),
                requires_context: false,
            },
        }
    }
}

/// An unordered pair of tokens; a violation is confirmed only when both
/// appear in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualPattern {
    pub a: String,
    pub b: String,
}

impl ContextualPattern {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into().to_lowercase(),
            b: b.into().to_lowercase(),
        }
    }

    /// Order-independent substring test against already-folded text.
    pub fn confirmed_by(&self, folded_text: &str) -> bool {
        !self.a.is_empty()
            && !self.b.is_empty()
            && folded_text.contains(&self.a)
            && folded_text.contains(&self.b)
    }
}

/// Canonicalized form of the raw input, produced by the input normalizer.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    /// The trimmed original input.
    pub raw_text: String,
    /// Percent-decoded, NFKC-folded, lowercased text used for matching.
    pub folded_text: String,
    pub normalized_url: Option<Url>,
    /// Host with any leading `www.` stripped.
    pub domain: Option<String>,
    pub discord_id: Option<DiscordId>,
}

/// Which class of keyword evidence confirmed a violation. The severity
/// priority is fixed: direct COC > contextual COC > IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationClass {
    CocDirect,
    CocContextual,
    IpViolation,
}

impl ViolationClass {
    pub fn severity(&self) -> Severity {
        match self {
            ViolationClass::CocDirect => Severity::Critical,
            ViolationClass::CocContextual => Severity::High,
            ViolationClass::IpViolation => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationClass::CocDirect => "coc",
            ViolationClass::CocContextual => "coc-contextual",
            ViolationClass::IpViolation => "ip",
        }
    }
}

/// Raw output of the keyword violation scanner, consumed by the assembler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    /// A global whitelist token matched; all keyword flagging is suppressed.
    pub whitelisted: bool,
    /// IP-violation tokens found in the input.
    pub ip_hits: Vec<String>,
    /// IP hits were exempted by a bypass token. Hits are retained so the
    /// result can still surface them as a low-confidence note.
    pub ip_bypassed: bool,
    /// Direct (non-contextual) COC tokens found in the input.
    pub coc_direct_hits: Vec<String>,
    /// Keywords of contextual patterns whose pair was fully present.
    pub coc_contextual_hits: Vec<String>,
    /// COC hits were exempted by a bypass token.
    pub coc_bypassed: bool,
}

impl ScanOutcome {
    pub fn suppressed() -> Self {
        ScanOutcome {
            whitelisted: true,
            ..ScanOutcome::default()
        }
    }

    pub fn has_hits(&self) -> bool {
        !self.ip_hits.is_empty()
            || !self.coc_direct_hits.is_empty()
            || !self.coc_contextual_hits.is_empty()
    }

    /// Violation classes with at least one confirmed (non-bypassed) hit.
    pub fn confirmed_classes(&self) -> Vec<ViolationClass> {
        let mut classes = Vec::new();
        if !self.coc_direct_hits.is_empty() && !self.coc_bypassed {
            classes.push(ViolationClass::CocDirect);
        }
        if !self.coc_contextual_hits.is_empty() && !self.coc_bypassed {
            classes.push(ViolationClass::CocContextual);
        }
        if !self.ip_hits.is_empty() && !self.ip_bypassed {
            classes.push(ViolationClass::IpViolation);
        }
        classes
    }

    pub fn confirmed(&self) -> bool {
        !self.confirmed_classes().is_empty()
    }

    /// Every literal keyword that matched, deduplicated, insertion order
    /// preserved for display.
    pub fn matched_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for hit in self
            .coc_direct_hits
            .iter()
            .chain(self.coc_contextual_hits.iter())
            .chain(self.ip_hits.iter())
        {
            if !keywords.iter().any(|k| k == hit) {
                keywords.push(hit.clone());
            }
        }
        keywords
    }
}

/// Final classification for one check call. Constructed fresh per call and
/// never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub is_blacklisted: bool,
    pub matched_creator: Option<String>,
    pub category: Option<Category>,
    pub reason: Option<String>,
    pub flagged_by: Option<String>,
    pub discord_server_id: Option<DiscordId>,
    pub match_type: MatchType,
    pub matched_keywords: Vec<String>,
    pub severity: Option<Severity>,
    /// Flagged for human review rather than an automatic verdict.
    pub possible_false_positive: bool,
}

impl CheckResult {
    /// A clean "nothing matched" result.
    pub fn clean() -> Self {
        CheckResult {
            is_blacklisted: false,
            matched_creator: None,
            category: None,
            reason: None,
            flagged_by: None,
            discord_server_id: None,
            match_type: MatchType::None,
            matched_keywords: Vec::new(),
            severity: None,
            possible_false_positive: false,
        }
    }

    /// Conservative result returned when no rule snapshot is available:
    /// not blacklisted, low confidence, flagged for review.
    pub fn degraded() -> Self {
        CheckResult {
            possible_false_positive: true,
            ..CheckResult::clean()
        }
    }
}

/// Kinds of community reports accepted by the false-positive sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// "This shouldn't have been flagged"
    FalsePositive,
    /// "This should have been caught"
    MissedViolation,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::FalsePositive => "false_positive",
            ReportType::MissedViolation => "missed_violation",
        }
    }
}

/// Errors the checker surfaces to callers. Reporting failures are never
/// represented here; telemetry must not affect classification.
#[derive(Debug, Error)]
pub enum CheckError {
    /// URL-like input that could not be parsed. Recoverable; surfaced to
    /// the caller as a user-facing message.
    #[error("invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// No rule snapshot has ever been loaded and no last-known-good copy
    /// exists. Callers that can degrade should prefer
    /// [`CheckResult::degraded`] over propagating this.
    #[error("rule store unavailable: {0}")]
    RuleStoreUnavailable(String),
}
