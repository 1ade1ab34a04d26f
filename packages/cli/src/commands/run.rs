use crate::scenario::Scenario;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use weft_common::Config;
use weft_component::VisitHints;
use weft_lifecycle::{Lifecycle, LifecycleError, Response, Severity};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario file, or a directory of scenario files
    pub path: PathBuf,

    /// Print the client ids of every rendered view
    #[arg(long)]
    pub tree: bool,
}

pub fn run(args: RunArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let path = cwd.join(&args.path);
    let files = find_scenarios(&path)?;

    if files.is_empty() {
        println!("{}", "⚠️  No scenario files found".yellow());
        return Ok(());
    }

    let mut failed_requests = 0;
    for file in &files {
        let scenario = Scenario::load(file)?;
        let fallback = file.display().to_string();
        println!("{} {}", "▶".bright_blue(), scenario.display_name(&fallback).bold());
        failed_requests += run_scenario(&scenario, &config, args.tree)?;
        println!();
    }

    if failed_requests == 0 {
        println!("{} Ran {} scenario(s)", "✅".green(), files.len());
        Ok(())
    } else {
        Err(anyhow!("{} request(s) failed", failed_requests))
    }
}

fn find_scenarios(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(anyhow!("Scenario path does not exist: {}", path.display()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Returns the number of requests that failed
fn run_scenario(scenario: &Scenario, config: &Config, show_tree: bool) -> Result<usize> {
    let lifecycle = Lifecycle::new(Arc::new(scenario.application(config)?));
    let mut tokens: HashMap<String, String> = HashMap::new();
    let mut failures = 0;

    for (index, step) in scenario.requests.iter().enumerate() {
        let request = step.to_request(&tokens);
        let method = if request.is_postback() { "POST" } else { "GET " };
        println!(
            "  [{}] {} {} {}",
            index + 1,
            method.bright_white(),
            request.view_id,
            format!("(session {})", request.session_id).dimmed()
        );

        match lifecycle.run(request) {
            Ok(response) => {
                if let Some(token) = &response.state_token {
                    tokens.insert(step.session_id.clone(), token.clone());
                }
                print_response(&response, show_tree);
            }
            Err(LifecycleError::ViewExpired { view_id, .. }) => {
                println!("      {} view '{}' expired", "⏱".yellow(), view_id);
            }
            Err(err) => {
                failures += 1;
                println!("      {} {}", "✗".red(), err.to_string().red());
                if let Some(response) = err.response() {
                    print_response(response, show_tree);
                }
            }
        }
    }

    Ok(failures)
}

fn print_response(response: &Response, show_tree: bool) {
    let phases: Vec<&str> = response.phases_run.iter().map(|p| p.name()).collect();
    println!("      {} {}", "phases".dimmed(), phases.join(" → "));

    if response.view_expired {
        println!("      {} expired, showing recovery view", "⏱".yellow());
    }
    match &response.redirect {
        Some(target) => println!("      {} redirect to {}", "↪".bright_blue(), target),
        None => println!("      {} {}", "view".dimmed(), response.view_id),
    }

    for message in &response.messages {
        let target = message.client_id.as_deref().unwrap_or("global");
        let line = format!("{}: {}", target, message.summary);
        match message.severity {
            Severity::Info => println!("      {} {}", "ℹ".bright_blue(), line),
            Severity::Warn => println!("      {} {}", "!".yellow(), line.yellow()),
            Severity::Error | Severity::Fatal => println!("      {} {}", "✗".red(), line.red()),
        }
    }

    if !response.mismatches.is_empty() {
        println!(
            "      {} {} saved record(s) no longer match the template",
            "!".yellow(),
            response.mismatches.len()
        );
    }

    if let Some(token) = &response.state_token {
        println!("      {} {} ({} bytes)", "token".dimmed(), abbreviate(token), token.len());
    }

    if show_tree {
        if let Some(view) = &response.view {
            for client_id in view.tree.client_ids(VisitHints::all()) {
                println!("        {}", client_id.dimmed());
            }
        }
    }
}

fn abbreviate(token: &str) -> String {
    const MAX: usize = 32;
    if token.chars().count() <= MAX {
        token.to_string()
    } else {
        let head: String = token.chars().take(MAX).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_scenarios_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_scenarios(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        assert!(find_scenarios(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short"), "short");
        assert_eq!(abbreviate(&"x".repeat(40)).chars().count(), 33);
    }
}
