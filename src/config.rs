//! Runtime configuration and tabular output.
//!
//! [`Config`] carries the options the CLI resolved, separated from argument
//! parsing so library callers and tests can build one directly.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::converter::TimezoneInfo;

/// Output formats for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => bail!("Unknown output format '{other}' (expected table, csv or json)"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Options for one tracetime invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    pub verbosity: u8,
    /// Timezone override for displaying real timestamps
    pub timezone: Option<TimezoneInfo>,
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbosity: 0,
            timezone: None,
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Default tracing filter directive for the configured verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

const MAX_COLUMN_WIDTH: usize = 50;

/// Render rows in the requested format.
pub fn render_rows(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let out = match format {
        OutputFormat::Csv => {
            let mut out = headers.join(",");
            out.push('\n');
            for row in rows {
                out.push_str(&row.join(","));
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => {
            let json_rows: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let obj: serde_json::Map<String, serde_json::Value> = headers
                        .iter()
                        .zip(row.iter())
                        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                        .collect();
                    serde_json::Value::Object(obj)
                })
                .collect();
            let mut out = serde_json::to_string_pretty(&json_rows)?;
            out.push('\n');
            out
        }
        OutputFormat::Table => format_table(headers, rows),
    };
    Ok(out)
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no results)\n".to_string();
    }

    // Widths are in chars; `{:width$}` pads by chars too.
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }
    for w in &mut widths {
        *w = (*w).min(MAX_COLUMN_WIDTH);
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths.get(i).copied().unwrap_or(10)))
        .collect();
    out.push_str(header_line.join(" | ").trim_end());
    out.push('\n');

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&sep.join("-+-"));
    out.push('\n');

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let width = widths.get(i).copied().unwrap_or(10);
                let truncated = if v.chars().count() > width && width > 3 {
                    let head: String = v.chars().take(width - 3).collect();
                    format!("{head}...")
                } else {
                    v.clone()
                };
                format!("{truncated:width$}")
            })
            .collect();
        out.push_str(row_line.join(" | ").trim_end());
        out.push('\n');
    }
    out
}
