// src/main.rs - CLI front end for the compliance checker

use anyhow::Result;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use resguard::config::AppConfig;
use resguard::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting resguard v{}", resguard::VERSION);

    let mut json_output = false;
    let mut inputs: Vec<String> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json_output = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => inputs.push(arg),
        }
    }

    let config_path =
        std::env::var("RESGUARD_CONFIG").unwrap_or_else(|_| "resguard.yaml".to_string());
    let config = AppConfig::load(&PathBuf::from(config_path))?;

    let rules = Arc::new(RuleStoreManager::with_load_timeout(
        &config.rules_dir,
        Duration::from_secs(config.rule_load_timeout_secs),
    ));
    rules.initialize().await?;
    if config.watch_rules {
        rules.start_watcher().await?;
    }

    let reporter: Arc<dyn CheckReporter> = match &config.reporting.endpoint {
        Some(endpoint) => Arc::new(HttpReporter::new(
            endpoint,
            Duration::from_secs(config.reporting.timeout_secs),
        )?),
        None => Arc::new(LogReporter::new()),
    };

    let service = CheckService::new(rules, reporter);

    if inputs.is_empty() {
        info!("no inputs given, reading queries from stdin (one per line)");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            run_check(&service, query, json_output).await;
        }
    } else {
        for query in &inputs {
            run_check(&service, query, json_output).await;
        }
    }

    Ok(())
}

async fn run_check(service: &CheckService, query: &str, json_output: bool) {
    match service.check(query).await {
        Ok(result) => {
            if json_output {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("failed to serialize result: {}", e),
                }
            } else {
                print_human(query, &result);
            }
        }
        Err(e) => warn!("check failed for '{}': {}", query, e),
    }
}

fn print_human(query: &str, result: &CheckResult) {
    if result.is_blacklisted {
        let severity = result
            .severity
            .map(|s| s.as_str())
            .unwrap_or("unknown");
        println!(
            "{}: BLACKLISTED ({}, severity {})",
            query,
            match result.match_type {
                MatchType::Entry => "curated entry",
                MatchType::Keyword => "keyword match",
                MatchType::None => "none",
            },
            severity
        );
        if let Some(creator) = &result.matched_creator {
            println!("  creator: {}", creator);
        }
        if let Some(reason) = &result.reason {
            println!("  reason: {}", reason);
        }
        if !result.matched_keywords.is_empty() {
            println!("  matched keywords: {}", result.matched_keywords.join(", "));
        }
    } else if result.possible_false_positive {
        println!(
            "{}: NEEDS REVIEW (keywords: {})",
            query,
            result.matched_keywords.join(", ")
        );
    } else {
        println!("{}: clean", query);
    }
}

fn print_usage() {
    println!("resguard v{} - resource/creator compliance checker", resguard::VERSION);
    println!();
    println!("Usage: resguard [--json] [QUERY]...");
    println!();
    println!("With no QUERY arguments, queries are read from stdin, one per line.");
    println!();
    println!("Environment:");
    println!("  RESGUARD_CONFIG           config file path (default: resguard.yaml)");
    println!("  RESGUARD_RULES_DIR        override the rules directory");
    println!("  RESGUARD_REPORT_ENDPOINT  stats backend base URL (empty disables)");
    println!("  RESGUARD_WATCH_RULES      1/true/yes to hot-reload rule files");
}
