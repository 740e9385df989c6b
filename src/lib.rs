//! # resguard
//!
//! Resource and creator compliance checker for community moderation:
//! given a free-form name, URL, or Discord invite, decide whether it
//! matches a curated blacklist entry or exhibits policy-violation
//! language, while avoiding false positives on legitimate brand and
//! context words.
//!
//! ## Features
//!
//! - **Multi-Source Matching**: entries match by link, keyword, Discord
//!   identifier, and guarded name containment, in a fixed precedence
//! - **Contextual Disambiguation**: ambiguous keywords confirm only when
//!   their paired term co-occurs; bypass tokens downgrade known-legitimate
//!   naming conventions to review instead of a block
//! - **Hot-Reloaded Rules**: YAML rule tables swap atomically as
//!   immutable snapshots; a failed reload keeps the last-known-good copy
//! - **Best-Effort Telemetry**: one fire-and-forget report per check,
//!   never affecting the classification outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resguard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let rules = Arc::new(RuleStoreManager::new("rules"));
//!     rules.initialize().await?;
//!
//!     let service = CheckService::new(rules, Arc::new(LogReporter::new()));
//!     let result = service.check("discord.gg/example").await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!
//!     Ok(())
//! }
//! ```

pub mod checker;
pub mod config;
pub mod reporting;
pub mod rules;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::checker::{CheckService, Checker};
    pub use crate::reporting::{CheckReporter, HttpReporter, LogReporter, NullReporter};
    pub use crate::rules::loader::RuleStoreManager;
    pub use crate::rules::RuleStore;
    pub use crate::types::{
        BlacklistEntry, Category, CheckError, CheckResult, DiscordId, MatchType, ReportType,
        Severity,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
