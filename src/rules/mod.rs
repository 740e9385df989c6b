// src/rules/mod.rs - Read-only rule snapshot and rule-file ingestion

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::types::{BlacklistEntry, Category, ContextualPattern, DiscordId, Severity, Token};

pub mod loader;

/// Date formats observed in hand-maintained rule data. Normalized here so
/// the typed model only ever carries `NaiveDate`.
const SINCE_DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d.%m.%Y", "%d/%m/%Y"];

/// Immutable, versioned snapshot of every rule table the checker reads.
///
/// The engine takes a snapshot by reference and never reaches into ambient
/// state; concurrent checks over the same snapshot need no coordination.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStore {
    /// Monotonic version, bumped by the loader on every successful swap.
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub entries: Vec<BlacklistEntry>,
    /// Lowercased; presence of any token suppresses keyword flagging.
    pub whitelist: Vec<String>,
    pub ip_violation: Vec<Token>,
    pub coc_violation: Vec<Token>,
    pub ip_bypass: Vec<Token>,
    pub coc_bypass: Vec<Token>,
    pub contextual_patterns: Vec<ContextualPattern>,
}

impl RuleStore {
    /// A snapshot with no rules at all; every check against it comes back
    /// clean. Version 0 marks "never loaded".
    pub fn empty() -> Self {
        RuleStore {
            version: 0,
            loaded_at: Utc::now(),
            entries: Vec::new(),
            whitelist: Vec::new(),
            ip_violation: Vec::new(),
            coc_violation: Vec::new(),
            ip_bypass: Vec::new(),
            coc_bypass: Vec::new(),
            contextual_patterns: Vec::new(),
        }
    }

    /// Resolve a Discord invite code to a numeric server id, when some
    /// entry records both the invite link and the resolved snowflake.
    pub fn resolve_invite(&self, code: &str) -> Option<String> {
        let code = code.to_lowercase();
        let gg_form = format!("discord.gg/{}", code);
        let invite_form = format!("discord.com/invite/{}", code);

        for entry in &self.entries {
            let Some(DiscordId::Resolved(id)) = &entry.discord_server_id else {
                continue;
            };
            let known = entry.links.iter().any(|link| {
                let link = link.to_lowercase();
                link.contains(&gg_form) || link.contains(&invite_form)
            });
            if known {
                debug!("resolved invite '{}' to server {} via '{}'", code, id, entry.name);
                return Some(id.clone());
            }
        }
        None
    }

    /// Build a snapshot from freshly parsed rule files.
    pub fn from_files(blacklist: &BlacklistFile, keywords: &KeywordFile, version: u64) -> Self {
        let mut entries = Vec::with_capacity(blacklist.entries.len());
        for (index, raw) in blacklist.entries.iter().enumerate() {
            match ingest_entry(raw) {
                Ok(entry) => entries.push(entry),
                Err(reason) => warn!("skipping blacklist row {}: {}", index, reason),
            }
        }

        let store = RuleStore {
            version,
            loaded_at: Utc::now(),
            entries,
            whitelist: keywords
                .global_whitelist
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            ip_violation: ingest_tokens(&keywords.ip_violation),
            coc_violation: ingest_tokens(&keywords.coc_violation),
            ip_bypass: ingest_tokens(&keywords.ip_bypass),
            coc_bypass: ingest_tokens(&keywords.coc_bypass),
            contextual_patterns: keywords
                .contextual_patterns
                .iter()
                .filter(|row| {
                    let ok = !row.a.trim().is_empty() && !row.b.trim().is_empty();
                    if !ok {
                        warn!("skipping contextual pattern with empty token: {:?}", row);
                    }
                    ok
                })
                .map(|row| ContextualPattern::new(row.a.clone(), row.b.clone()))
                .collect(),
        };
        store.log_stats();
        store
    }

    pub fn log_stats(&self) {
        info!(
            "rule store v{}: {} entries, {} whitelist tokens, {} ip / {} coc violation keywords, {} ip / {} coc bypass keywords, {} contextual patterns",
            self.version,
            self.entries.len(),
            self.whitelist.len(),
            self.ip_violation.len(),
            self.coc_violation.len(),
            self.ip_bypass.len(),
            self.coc_bypass.len(),
            self.contextual_patterns.len(),
        );
    }
}

/// On-disk shape of `blacklist.yaml`. Rows are kept as raw YAML values so
/// one malformed row is skipped with a warning instead of failing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistFile {
    #[serde(default)]
    pub entries: Vec<serde_yaml::Value>,
}

/// One hand-edited blacklist row before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub name: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub flagged_by: String,
    #[serde(default)]
    pub discord_server_id: Option<String>,
    #[serde(default)]
    pub blacklisted_since: Option<String>,
}

fn default_severity() -> String {
    "medium".to_string()
}

fn default_category() -> String {
    "other".to_string()
}

/// On-disk shape of `keywords.yaml`: the four keyword sets, the global
/// whitelist, and the contextual co-occurrence patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordFile {
    #[serde(default)]
    pub global_whitelist: Vec<String>,
    #[serde(default)]
    pub ip_violation: Vec<String>,
    #[serde(default)]
    pub coc_violation: Vec<String>,
    #[serde(default)]
    pub ip_bypass: Vec<String>,
    #[serde(default)]
    pub coc_bypass: Vec<String>,
    #[serde(default)]
    pub contextual_patterns: Vec<PatternRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRow {
    pub a: String,
    pub b: String,
}

fn ingest_tokens(raw: &[String]) -> Vec<Token> {
    raw.iter()
        .map(|t| Token::parse(t))
        .filter(|t| {
            if t.text.is_empty() {
                warn!("skipping empty keyword token");
            }
            !t.text.is_empty()
        })
        .collect()
}

fn ingest_entry(raw: &serde_yaml::Value) -> Result<BlacklistEntry, String> {
    let raw: RawEntry =
        serde_yaml::from_value(raw.clone()).map_err(|e| format!("malformed row: {}", e))?;

    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err("entry has an empty name".to_string());
    }

    let severity = Severity::parse(&raw.severity)
        .ok_or_else(|| format!("'{}' has unknown severity '{}'", name, raw.severity))?;

    // Category only drives display grouping, so an unknown value falls back
    // to Other instead of dropping the row.
    let category = Category::parse(&raw.category).unwrap_or_else(|| {
        warn!("entry '{}': unknown category '{}', using 'other'", name, raw.category);
        Category::Other
    });

    let keyword = if raw.keyword.trim().is_empty() {
        name.to_lowercase()
    } else {
        raw.keyword.trim().to_lowercase()
    };

    let blacklisted_since = raw
        .blacklisted_since
        .as_deref()
        .and_then(|date| parse_since_date(&name, date));

    Ok(BlacklistEntry {
        name,
        links: raw.links.iter().map(|l| l.trim().to_string()).collect(),
        reason: raw.reason.trim().to_string(),
        severity,
        category,
        keyword,
        flagged_by: raw.flagged_by.trim().to_string(),
        discord_server_id: raw
            .discord_server_id
            .map(|id| DiscordId::from(id.trim().to_string())),
        blacklisted_since,
    })
}

fn parse_since_date(entry_name: &str, raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in SINCE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    warn!("entry '{}': unparseable blacklisted_since '{}', dropping date", entry_name, raw);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_file() -> KeywordFile {
        KeywordFile {
            global_whitelist: vec!["FiveM-Approved ".to_string()],
            ip_violation: vec!["leak".to_string()],
            coc_violation: vec!["cheat".to_string(), "child:".to_string()],
            ip_bypass: vec!["qs-".to_string()],
            coc_bypass: vec![],
            contextual_patterns: vec![PatternRow {
                a: "child".to_string(),
                b: "sex".to_string(),
            }],
        }
    }

    #[test]
    fn test_from_files_normalizes_tokens_and_whitelist() {
        let store = RuleStore::from_files(&BlacklistFile::default(), &keyword_file(), 1);

        assert_eq!(store.whitelist, vec!["fivem-approved".to_string()]);
        assert_eq!(store.coc_violation.len(), 2);
        assert!(!store.coc_violation[0].requires_context);
        assert!(store.coc_violation[1].requires_context);
        assert_eq!(store.coc_violation[1].text, "child");
        assert_eq!(store.contextual_patterns.len(), 1);
    }

    #[test]
    fn test_malformed_entry_is_skipped_not_fatal() {
        let yaml = r#"
entries:
  - name: kalileaks
    links: ["https://www.kalileaks.com/"]
    severity: critical
    reason: leaking paid resources
  - name: broken
    severity: not-a-severity
  - links: ["https://no-name.example"]
    severity: low
"#;
        let file: BlacklistFile = serde_yaml::from_str(yaml).unwrap();
        let store = RuleStore::from_files(&file, &KeywordFile::default(), 3);

        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.entries[0].name, "kalileaks");
        assert_eq!(store.entries[0].severity, Severity::Critical);
        assert_eq!(store.version, 3);
    }

    #[test]
    fn test_entry_keyword_defaults_to_lowercased_name() {
        let yaml = r#"
entries:
  - name: KaliLeaks
    severity: high
"#;
        let file: BlacklistFile = serde_yaml::from_str(yaml).unwrap();
        let store = RuleStore::from_files(&file, &KeywordFile::default(), 1);
        assert_eq!(store.entries[0].keyword, "kalileaks");
    }

    #[test]
    fn test_since_date_accepts_all_observed_formats() {
        assert_eq!(
            parse_since_date("x", "05-03-2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_since_date("x", "05.03.2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_since_date("x", "05/03/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_since_date("x", "March 5th 2024"), None);
    }

    #[test]
    fn test_resolve_invite_finds_resolved_entry() {
        let yaml = r#"
entries:
  - name: cheat hub
    links: ["https://discord.gg/fivem0"]
    severity: critical
    category: discord
    discord_server_id: "1302150541454868551"
  - name: invite only
    links: ["https://discord.gg/unresolved"]
    severity: high
    category: discord
    discord_server_id: "invite:unresolved"
"#;
        let file: BlacklistFile = serde_yaml::from_str(yaml).unwrap();
        let store = RuleStore::from_files(&file, &KeywordFile::default(), 1);

        assert_eq!(
            store.resolve_invite("fivem0"),
            Some("1302150541454868551".to_string())
        );
        // An entry that only knows the invite code cannot resolve it.
        assert_eq!(store.resolve_invite("unresolved"), None);
        assert_eq!(store.resolve_invite("missing"), None);
    }

    #[test]
    fn test_unparseable_since_date_keeps_the_row() {
        let yaml = r#"
entries:
  - name: old entry
    severity: low
    blacklisted_since: "sometime in 2023"
  - name: dated entry
    severity: low
    blacklisted_since: "12/11/2023"
"#;
        let file: BlacklistFile = serde_yaml::from_str(yaml).unwrap();
        let store = RuleStore::from_files(&file, &KeywordFile::default(), 1);

        assert_eq!(store.entries.len(), 2);
        assert_eq!(store.entries[0].blacklisted_since, None);
        assert_eq!(
            store.entries[1].blacklisted_since,
            NaiveDate::from_ymd_opt(2023, 11, 12)
        );
    }
}
