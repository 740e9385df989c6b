// src/checker/mod.rs - Check pipeline and service orchestration

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use crate::reporting::{CheckReport, CheckReporter, FalsePositiveReport};
use crate::rules::loader::RuleStoreManager;
use crate::rules::RuleStore;
use crate::types::{CheckError, CheckResult, ReportType};

pub mod assembler;
pub mod matcher;
pub mod normalizer;
pub mod scanner;

use assembler::ResultAssembler;
use matcher::BlacklistMatcher;
use normalizer::InputNormalizer;
use scanner::KeywordScanner;

/// Rough shape of the query, recorded with each check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Url,
    Discord,
    Name,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Url => "url",
            QueryType::Discord => "discord",
            QueryType::Name => "name",
        }
    }

    fn guess(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("discord.gg/") || lower.contains("discord.com/invite/") {
            QueryType::Discord
        } else if lower.contains("http") || lower.contains('.') {
            QueryType::Url
        } else {
            QueryType::Name
        }
    }
}

/// Telemetry context produced alongside a classification.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub query_type: QueryType,
    pub violation_type: Option<String>,
}

/// The pure classification engine: normalize, match, scan, assemble.
///
/// Stateless per call; concurrent checks over the same snapshot need no
/// coordination.
pub struct Checker {
    normalizer: InputNormalizer,
    matcher: BlacklistMatcher,
    scanner: KeywordScanner,
    assembler: ResultAssembler,
}

impl Checker {
    pub fn new() -> Self {
        Self {
            normalizer: InputNormalizer::new(),
            matcher: BlacklistMatcher::new(),
            scanner: KeywordScanner::new(),
            assembler: ResultAssembler::new(),
        }
    }

    pub fn check(&self, raw: &str, rules: &RuleStore) -> Result<CheckResult, CheckError> {
        self.check_detailed(raw, rules).map(|(result, _)| result)
    }

    /// Classify and also return the telemetry context for the reporting
    /// hook.
    pub fn check_detailed(
        &self,
        raw: &str,
        rules: &RuleStore,
    ) -> Result<(CheckResult, CheckContext), CheckError> {
        let input = self.normalizer.normalize(raw, rules)?;
        let entry = self.matcher.find_entry(&input, rules);
        let scan = self.scanner.scan(&input, rules);
        let result = self.assembler.assemble(entry, &scan);

        let query_type = if input.discord_id.is_some() {
            QueryType::Discord
        } else {
            QueryType::guess(&input.raw_text)
        };
        let context = CheckContext {
            query_type,
            violation_type: self.assembler.violation_type(&scan),
        };

        debug!(
            "check '{}': blacklisted={} match={:?} keywords={:?}",
            raw, result.is_blacklisted, result.match_type, result.matched_keywords
        );
        Ok((result, context))
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

/// Service wrapper around the engine: fetches the current snapshot,
/// degrades gracefully when none exists, and ships telemetry.
pub struct CheckService {
    checker: Checker,
    rules: Arc<RuleStoreManager>,
    reporter: Arc<dyn CheckReporter>,
}

impl CheckService {
    pub fn new(rules: Arc<RuleStoreManager>, reporter: Arc<dyn CheckReporter>) -> Self {
        Self {
            checker: Checker::new(),
            rules,
            reporter,
        }
    }

    /// Check one query against the current rule snapshot.
    ///
    /// Missing snapshot degrades to a conservative "not blacklisted, low
    /// confidence" result instead of failing the call.
    pub async fn check(&self, raw: &str) -> Result<CheckResult, CheckError> {
        let (result, context) = match self.rules.snapshot().await {
            Some(store) => self.checker.check_detailed(raw, &store)?,
            None => {
                warn!("no rule snapshot available, degrading check for '{}'", raw);
                (
                    CheckResult::degraded(),
                    CheckContext {
                        query_type: QueryType::guess(raw),
                        violation_type: None,
                    },
                )
            }
        };
        self.dispatch_report(raw, &result, context);
        Ok(result)
    }

    /// Forward a community false-positive report. Fire-and-forget like all
    /// telemetry; the collaborator owns increment-or-insert semantics.
    pub fn report_false_positive(
        &self,
        resource_name: impl Into<String>,
        report_type: ReportType,
        server_name: Option<String>,
        connection_code: Option<String>,
    ) {
        let report = FalsePositiveReport {
            resource_name: resource_name.into(),
            report_type,
            server_name,
            connection_code,
            reported_at: Utc::now(),
        };
        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            if let Err(e) = reporter.report_false_positive(report).await {
                debug!("false-positive report dropped: {}", e);
            }
        });
    }

    // At-most-once, best effort: failures are logged at debug and
    // forgotten, never retried, never surfaced to the caller.
    fn dispatch_report(&self, raw: &str, result: &CheckResult, context: CheckContext) {
        let report = CheckReport {
            query: raw.to_string(),
            query_type: context.query_type.as_str().to_string(),
            is_blacklisted: result.is_blacklisted,
            matched_keywords: result.matched_keywords.clone(),
            violation_type: context.violation_type,
            checked_at: Utc::now(),
        };
        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            if let Err(e) = reporter.report_check(report).await {
                debug!("check report dropped: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BlacklistEntry, Category, ContextualPattern, DiscordId, MatchType, Severity, Token,
    };

    fn fixture_store() -> RuleStore {
        RuleStore {
            version: 1,
            entries: vec![
                BlacklistEntry {
                    name: "kalileaks".to_string(),
                    links: vec!["https://www.kalileaks.com/".to_string()],
                    reason: "leaking paid resources".to_string(),
                    severity: Severity::Critical,
                    category: Category::Other,
                    keyword: "kalileaks".to_string(),
                    flagged_by: "mod team".to_string(),
                    discord_server_id: None,
                    blacklisted_since: None,
                },
                BlacklistEntry {
                    name: "cheat hub".to_string(),
                    links: vec!["https://discord.gg/fivem0".to_string()],
                    reason: "selling cheats".to_string(),
                    severity: Severity::Critical,
                    category: Category::Discord,
                    keyword: "zz-cheat-hub".to_string(),
                    flagged_by: "community".to_string(),
                    discord_server_id: Some(DiscordId::Resolved(
                        "1302150541454868551".to_string(),
                    )),
                    blacklisted_since: None,
                },
            ],
            whitelist: vec!["fivem-approved".to_string()],
            ip_violation: vec![Token::parse("approved"), Token::parse("leakhub")],
            coc_violation: vec![
                Token::parse("cheats"),
                Token::parse("school:"),
                Token::parse("sex:"),
            ],
            ip_bypass: vec![Token::parse("qs-")],
            coc_bypass: vec![Token::parse("qs-")],
            contextual_patterns: vec![ContextualPattern::new("school", "sex")],
            ..RuleStore::empty()
        }
    }

    #[test]
    fn test_every_entry_link_is_blacklisted_with_its_creator() {
        let store = fixture_store();
        let checker = Checker::new();

        for entry in &store.entries {
            for link in &entry.links {
                let result = checker.check(link, &store).unwrap();
                assert!(result.is_blacklisted, "link {}", link);
                assert_eq!(result.matched_creator.as_deref(), Some(entry.name.as_str()));
                assert_eq!(result.match_type, MatchType::Entry);
            }
        }
    }

    #[test]
    fn test_seeded_kalileaks_scenario() {
        let store = fixture_store();
        let result = Checker::new()
            .check("https://kalileaks.com/", &store)
            .unwrap();

        assert!(result.is_blacklisted);
        assert_eq!(result.severity, Some(Severity::Critical));
        assert_eq!(result.matched_creator.as_deref(), Some("kalileaks"));
    }

    #[test]
    fn test_seeded_discord_invite_scenario() {
        let store = fixture_store();
        let result = Checker::new().check("discord.gg/fivem0", &store).unwrap();

        assert!(result.is_blacklisted);
        assert_eq!(result.match_type, MatchType::Entry);
        assert_eq!(result.matched_creator.as_deref(), Some("cheat hub"));
        assert_eq!(result.category, Some(Category::Discord));
        assert_eq!(
            result.discord_server_id,
            Some(DiscordId::Resolved("1302150541454868551".to_string()))
        );
    }

    #[test]
    fn test_whitelist_token_wins_over_violation_keyword() {
        let store = fixture_store();
        // "approved" is an ip_violation token, but the whitelist token
        // containing it suppresses keyword flagging entirely.
        let result = Checker::new().check("fivem-approved", &store).unwrap();
        assert!(!result.is_blacklisted);
        assert!(result.matched_keywords.is_empty());
    }

    #[test]
    fn test_contextual_confirmation_is_symmetric() {
        let store = fixture_store();
        let checker = Checker::new();
        let forward = checker.check("school sex", &store).unwrap();
        let reverse = checker.check("sex school", &store).unwrap();

        assert!(forward.is_blacklisted);
        assert_eq!(forward.is_blacklisted, reverse.is_blacklisted);
        assert_eq!(forward.severity, reverse.severity);
        assert_eq!(forward.severity, Some(Severity::High));
    }

    #[test]
    fn test_lone_contextual_token_stays_clean() {
        let store = fixture_store();
        let result = Checker::new().check("school trip", &store).unwrap();
        assert!(!result.is_blacklisted);
        assert_eq!(result.match_type, MatchType::None);
    }

    #[test]
    fn test_bypass_token_flags_review_instead_of_block() {
        let store = fixture_store();
        let result = Checker::new().check("qs-cheats", &store).unwrap();

        assert!(!result.is_blacklisted);
        assert!(result.possible_false_positive);
        assert_eq!(result.match_type, MatchType::Keyword);
        assert_eq!(result.matched_keywords, vec!["cheats".to_string()]);
    }

    #[test]
    fn test_clean_input_has_no_match() {
        let store = fixture_store();
        let result = Checker::new().check("My Totally Fine Server", &store).unwrap();

        assert!(!result.is_blacklisted);
        assert_eq!(result.match_type, MatchType::None);
        assert!(result.matched_keywords.is_empty());
    }

    #[test]
    fn test_check_is_idempotent_over_a_fixed_snapshot() {
        let store = fixture_store();
        let checker = Checker::new();

        for query in ["https://kalileaks.com/", "qs-cheats", "school sex", "clean name"] {
            let first = checker.check(query, &store).unwrap();
            let second = checker.check(query, &store).unwrap();
            assert_eq!(first, second, "query {}", query);
        }
    }

    #[test]
    fn test_query_type_detection() {
        assert_eq!(QueryType::guess("discord.gg/abc"), QueryType::Discord);
        assert_eq!(QueryType::guess("https://example.com"), QueryType::Url);
        assert_eq!(QueryType::guess("plain name"), QueryType::Name);
    }

    mod service {
        use super::*;
        use crate::reporting::NullReporter;
        use std::sync::Mutex;
        use tempfile::tempdir;
        use tokio::time::{sleep, Duration};

        struct CaptureReporter {
            checks: Mutex<Vec<CheckReport>>,
            false_positives: Mutex<Vec<FalsePositiveReport>>,
        }

        impl CaptureReporter {
            fn new() -> Self {
                Self {
                    checks: Mutex::new(Vec::new()),
                    false_positives: Mutex::new(Vec::new()),
                }
            }
        }

        #[async_trait::async_trait]
        impl CheckReporter for CaptureReporter {
            async fn report_check(&self, report: CheckReport) -> anyhow::Result<()> {
                self.checks.lock().unwrap().push(report);
                Ok(())
            }

            async fn report_false_positive(
                &self,
                report: FalsePositiveReport,
            ) -> anyhow::Result<()> {
                self.false_positives.lock().unwrap().push(report);
                Ok(())
            }
        }

        async fn initialized_manager(dir: &std::path::Path) -> Arc<RuleStoreManager> {
            tokio::fs::write(
                dir.join("blacklist.yaml"),
                r#"
entries:
  - name: kalileaks
    links: ["https://www.kalileaks.com/"]
    severity: critical
    reason: leaking paid resources
"#,
            )
            .await
            .unwrap();
            tokio::fs::write(
                dir.join("keywords.yaml"),
                "coc_violation: [\"cheats\"]\n",
            )
            .await
            .unwrap();

            let manager = Arc::new(RuleStoreManager::new(dir));
            manager.initialize().await.unwrap();
            manager
        }

        #[tokio::test]
        async fn test_missing_snapshot_degrades_conservatively() {
            let temp_dir = tempdir().unwrap();
            // Never initialized: no snapshot exists.
            let manager = Arc::new(RuleStoreManager::new(temp_dir.path()));
            let service = CheckService::new(manager, Arc::new(NullReporter::new()));

            let result = service.check("https://kalileaks.com/").await.unwrap();
            assert_eq!(result, CheckResult::degraded());
            assert!(!result.is_blacklisted);
            assert!(result.possible_false_positive);
        }

        #[tokio::test]
        async fn test_check_dispatches_one_report() {
            let temp_dir = tempdir().unwrap();
            let manager = initialized_manager(temp_dir.path()).await;
            let reporter = Arc::new(CaptureReporter::new());
            let service = CheckService::new(manager, reporter.clone());

            let result = service.check("https://kalileaks.com/").await.unwrap();
            assert!(result.is_blacklisted);

            for _ in 0..50 {
                if !reporter.checks.lock().unwrap().is_empty() {
                    break;
                }
                sleep(Duration::from_millis(20)).await;
            }

            let checks = reporter.checks.lock().unwrap();
            assert_eq!(checks.len(), 1);
            assert_eq!(checks[0].query, "https://kalileaks.com/");
            assert_eq!(checks[0].query_type, "url");
            assert!(checks[0].is_blacklisted);
        }

        #[tokio::test]
        async fn test_false_positive_report_is_forwarded() {
            let temp_dir = tempdir().unwrap();
            let manager = initialized_manager(temp_dir.path()).await;
            let reporter = Arc::new(CaptureReporter::new());
            let service = CheckService::new(manager, reporter.clone());

            service.report_false_positive(
                "qs-banking",
                ReportType::FalsePositive,
                Some("My RP Server".to_string()),
                None,
            );

            for _ in 0..50 {
                if !reporter.false_positives.lock().unwrap().is_empty() {
                    break;
                }
                sleep(Duration::from_millis(20)).await;
            }

            let reports = reporter.false_positives.lock().unwrap();
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].resource_name, "qs-banking");
            assert_eq!(reports[0].report_type, ReportType::FalsePositive);
            assert_eq!(reports[0].server_name.as_deref(), Some("My RP Server"));
        }

        #[tokio::test]
        async fn test_invalid_input_surfaces_as_user_error() {
            let temp_dir = tempdir().unwrap();
            let manager = initialized_manager(temp_dir.path()).await;
            let service = CheckService::new(manager, Arc::new(NullReporter::new()));

            let err = service.check("http://[broken").await.unwrap_err();
            assert!(matches!(err, CheckError::InvalidInput { .. }));
        }
    }
}
