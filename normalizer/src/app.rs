//! Command-line application

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::domain::compile::{CompiledBundle, check_dir};
use crate::domain::engine::Normalizer;
use crate::domain::rules::{RuleSet, ValidationMode, ValidationReport, validate};

pub struct CoreApp {
    pub config: AppConfig,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self {
            config: AppConfig::load(&cli_config)?,
        };
        match command {
            Commands::Validate => app.validate_rules(),
            Commands::Compile => app.compile_rules(),
            Commands::Normalize { input, pretty } => app.normalize(input.as_deref(), pretty),
        }
    }

    fn init_logging() {
        let default_filter = format!("warn,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    fn mode(&self) -> ValidationMode {
        self.config.rules.mode
    }

    fn source_label(&self) -> String {
        match &self.config.rules.dir {
            Some(dir) => dir.display().to_string(),
            None => "built-in rules".to_string(),
        }
    }

    /// Print every issue; fail when the rule set is invalid under the active mode
    fn validate_rules(&self) -> Result<()> {
        let report = match &self.config.rules.dir {
            Some(dir) => check_dir(dir)?,
            None => validate(&RuleSet::builtin()?),
        };
        print_report(&self.source_label(), &report, self.mode());

        if report.is_valid(self.mode()) {
            Ok(())
        } else {
            anyhow::bail!(
                "Rule validation failed ({} errors, {} warnings, {} mode)",
                report.errors.len(),
                report.warnings.len(),
                self.mode()
            )
        }
    }

    fn compile_rules(&self) -> Result<()> {
        let bundle = self.load_bundle()?;
        let summary = serde_json::to_string_pretty(&bundle.summary())
            .context("Failed to encode bundle summary")?;
        println!("{summary}");
        Ok(())
    }

    fn load_bundle(&self) -> Result<CompiledBundle> {
        let bundle = match &self.config.rules.dir {
            Some(dir) => crate::domain::compile::compile_dir(dir, self.mode()),
            None => CompiledBundle::compile(&RuleSet::builtin()?, self.mode()),
        };
        bundle.with_context(|| format!("Failed to compile {}", self.source_label()))
    }

    fn normalize(&self, input: Option<&Path>, pretty: bool) -> Result<()> {
        let normalizer = Normalizer::new(self.load_bundle()?, self.config.engine_options());

        let content = match input {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read input: {}", path.display()))?,
            None => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            }
        };

        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        let mut records = 0usize;
        for record in parse_records(&content) {
            let event = normalizer.normalize_value(&record);
            let line = if pretty {
                serde_json::to_string_pretty(&event)
            } else {
                serde_json::to_string(&event)
            }
            .context("Failed to encode event")?;
            writeln!(out, "{line}")?;
            records += 1;
        }
        out.flush()?;

        let stats = normalizer.cache_stats();
        tracing::debug!(
            records,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            hit_ratio = stats.hit_ratio(),
            "Normalization finished"
        );
        Ok(())
    }
}

/// One JSON document, or JSON Lines. Unparseable lines are logged and skipped.
fn parse_records(content: &str) -> Vec<JsonValue> {
    if let Ok(value) = serde_json::from_str::<JsonValue>(content) {
        return vec![value];
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "Skipping invalid JSON line");
                None
            }
        })
        .collect()
}

fn print_report(source: &str, report: &ValidationReport, mode: ValidationMode) {
    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("{source}: ok");
        return;
    }
    for issue in &report.errors {
        println!("error: {issue}");
    }
    let label = match mode {
        ValidationMode::Strict => "error",
        ValidationMode::Permissive => "warning",
    };
    for warning in &report.warnings {
        println!("{label}: {warning}");
    }
    println!(
        "{source}: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_single_document() {
        let records = parse_records("{\n  \"model\": \"gpt-4\"\n}\n");
        assert_eq!(records, vec![serde_json::json!({"model": "gpt-4"})]);
    }

    #[test]
    fn test_parse_records_json_lines() {
        let records = parse_records("{\"a\": 1}\n\n{\"b\": 2}\nnot json\n[3]\n");
        assert_eq!(
            records,
            vec![
                serde_json::json!({"a": 1}),
                serde_json::json!({"b": 2}),
                serde_json::json!([3]),
            ]
        );
    }

    #[test]
    fn test_parse_records_empty_input() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("\n  \n").is_empty());
    }
}
