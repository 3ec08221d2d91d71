//! Lines-of-code measurement.
//!
//! The line counter (cloc by default) prints a fixed-width table:
//!
//! ```text
//! -------------------------------------------------------------------------------
//! Language                     files          blank        comment           code
//! -------------------------------------------------------------------------------
//! Go                              10             50             20            500
//! Markdown                         2              4              0             12
//! -------------------------------------------------------------------------------
//! SUM:                            12             54             20            512
//! -------------------------------------------------------------------------------
//! ```
//!
//! A run that yields no usable total falls back to the cached measurement and
//! leaves the cache alone; a non-zero total replaces the cached record.

use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::cache::StatsCache;
use crate::exec::{CommandRunner, CommandSpec};
use crate::outcome::{Outcome, Stage};
use crate::types::{CacheRecord, LanguageStat, LocReport, TOTAL_LABEL};

const HEADER_PREFIX: &str = "Language";
const SEPARATOR_PREFIX: &str = "---";
const SUM_LABEL: &str = "SUM:";

#[derive(Debug, Error)]
pub enum LocError {
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed: {}", .stderr.trim())]
    Failed { command: String, stderr: String },
}

/// Runs the line counter against a working copy.
pub struct LocCollector<'a> {
    runner: &'a dyn CommandRunner,
    tool: String,
}

impl<'a> LocCollector<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }

    /// Raw output of `<tool> <working_copy>`.
    pub fn count(&self, working_copy: &Path) -> Result<String, LocError> {
        let spec = CommandSpec::new(&self.tool).arg(working_copy.to_string_lossy());
        let output = self.runner.run(&spec).map_err(|source| LocError::Spawn {
            command: spec.to_string(),
            source,
        })?;
        if !output.success {
            return Err(LocError::Failed {
                command: spec.to_string(),
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    /// Measure `working_copy`, consulting and updating `cache`.
    pub fn measure(
        &self,
        working_copy: &Path,
        cache: &mut StatsCache,
        outcome: &mut Outcome,
    ) -> LocReport {
        self.measure_at(working_copy, cache, outcome, Utc::now())
    }

    fn measure_at(
        &self,
        working_copy: &Path,
        cache: &mut StatsCache,
        outcome: &mut Outcome,
        now: DateTime<Utc>,
    ) -> LocReport {
        let output = match self.count(working_copy) {
            Ok(output) => output,
            Err(e) => {
                outcome.record(Stage::Stats, e);
                String::new()
            }
        };

        let line_count = parse_line_count(&output);
        let language_stats = parse_language_stats(&output);
        log::debug!("{} lines, {} language rows", line_count, language_stats.len());

        if line_count == 0 {
            let cached = cache.current();
            log::debug!(
                "no usable count for {}, using cached value {}",
                working_copy.display(),
                cached.line_count
            );
            return LocReport::from(cached);
        }

        let record = CacheRecord {
            line_count,
            language_stats: language_stats.clone(),
            timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        };
        let repository = cache.repository().to_string();
        cache.update(&repository, record);
        if let Err(e) = cache.persist() {
            outcome.record(Stage::Cache, e);
        }

        LocReport {
            line_count,
            language_stats,
        }
    }
}

fn has_table(output: &str) -> bool {
    output.contains(SUM_LABEL) || output.contains(HEADER_PREFIX)
}

/// Rows of the language table, `SUM:` relabelled as `Total`.
///
/// The last four whitespace-separated tokens of a row are the counts and
/// whatever precedes them is the language (`C/C++ Header`, `Bourne Shell`).
pub fn parse_language_stats(output: &str) -> Vec<LanguageStat> {
    let mut stats = Vec::new();
    if !has_table(output) {
        return stats;
    }

    let mut in_table = false;
    for line in output.lines() {
        if line.starts_with(SEPARATOR_PREFIX) {
            continue;
        }
        if line.starts_with(HEADER_PREFIX) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 {
            continue;
        }
        let (label, counts) = tokens.split_at(tokens.len() - 4);
        if !counts.iter().all(|c| c.parse::<u64>().is_ok()) {
            continue;
        }

        let language = label.join(" ");
        let language = if language == SUM_LABEL {
            TOTAL_LABEL.to_string()
        } else {
            language
        };

        stats.push(LanguageStat {
            language,
            files: counts[0].to_string(),
            blank: counts[1].to_string(),
            comment: counts[2].to_string(),
            code: counts[3].to_string(),
        });
    }

    stats
}

/// Total lines of code, 0 when the output holds no table.
///
/// Taken from the `SUM:` row; cloc prints no `SUM:` row for a single
/// language, in which case that row's code column is the total. As a last
/// resort the last token of the third line from the end is used, which is
/// where the grand total sits in cloc's layout.
pub fn parse_line_count(output: &str) -> i64 {
    if !has_table(output) {
        return 0;
    }

    let rows = parse_language_stats(output);
    if let Some(total) = rows.iter().find(|row| row.language == TOTAL_LABEL) {
        return total.code.parse().unwrap_or(0);
    }
    if let [single] = rows.as_slice() {
        return single.code.parse().unwrap_or(0);
    }

    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() < 3 {
        return 0;
    }
    lines[lines.len() - 3]
        .split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}
