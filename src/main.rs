//! Enrollment Trends - Department Enrollment Change Chart
//!
//! Downloads two registrar term exports, compares undergraduate enrollment per
//! department and renders the biggest gainers and losers as a diverging bar
//! chart.

mod charts;
mod config;
mod data;
mod fetch;
mod pipeline;
mod report;
mod stats;

use anyhow::{Context, Result};
use clap::Parser;
use config::PipelineConfig;
use pipeline::EnrollmentPipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Chart which departments gained and lost the most undergraduates between two terms.
#[derive(Parser, Debug)]
#[command(name = "enrollment_trends", version)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Prior-term export (http(s) URL or local path)
    #[arg(long, value_name = "URL|PATH")]
    prior: Option<String>,

    /// Current-term export (http(s) URL or local path)
    #[arg(long, value_name = "URL|PATH")]
    current: Option<String>,

    #[arg(long)]
    prior_label: Option<String>,

    #[arg(long)]
    current_label: Option<String>,

    /// Chart output; `.svg` for SVG, anything else for PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the charted departments as JSON
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Preamble rows above the header row
    #[arg(long)]
    header_skip: Option<usize>,

    /// Minimum undergraduates per term for a department to be compared
    #[arg(long = "min-total")]
    min_total: Option<i64>,

    /// Number of gainers and of losers to chart
    #[arg(long = "top-k")]
    top_k: Option<usize>,

    /// Value axis spans -LIMIT..LIMIT percent
    #[arg(long, value_name = "LIMIT")]
    axis_limit: Option<i64>,

    /// HTTP timeout per download
    #[arg(long = "timeout", value_name = "SECS")]
    timeout: Option<u64>,

    /// Open the chart with the system viewer when done
    #[arg(long)]
    open: bool,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(source) = &self.prior {
            config.prior.source = source.clone();
        }
        if let Some(source) = &self.current {
            config.current.source = source.clone();
        }
        if let Some(label) = &self.prior_label {
            config.prior.label = Some(label.clone());
        }
        if let Some(label) = &self.current_label {
            config.current.label = Some(label.clone());
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(summary) = &self.summary {
            config.summary = Some(summary.clone());
        }
        if let Some(skip) = self.header_skip {
            config.header_skip = skip;
        }
        if let Some(min_total) = self.min_total {
            config.min_department_total = min_total;
        }
        if let Some(k) = self.top_k {
            config.top_bottom_k = k;
        }
        if let Some(limit) = self.axis_limit {
            config.axis_limit = limit;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
    }
}

fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let outcome = EnrollmentPipeline::new(&config)
        .run()
        .context("enrollment analysis aborted")?;
    info!(
        ranked = outcome.ranked.len(),
        charted = outcome.display.len(),
        output = %config.output.display(),
        "done"
    );

    if cli.open {
        open::that(&config.output)
            .with_context(|| format!("failed to open {}", config.output.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "enrollment_trends",
            "--prior",
            "https://example.edu/sp18.xlsx",
            "--current",
            "sp19.csv",
            "--current-label",
            "Spring 2020",
            "--min-total",
            "100",
            "--top-k",
            "5",
            "--axis-limit",
            "80",
            "-o",
            "chart.svg",
        ]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.prior.source, "https://example.edu/sp18.xlsx");
        assert_eq!(config.current.source, "sp19.csv");
        assert_eq!(config.prior_label(), "Spring 2018");
        assert_eq!(config.current_label(), "Spring 2020");
        assert_eq!(config.min_department_total, 100);
        assert_eq!(config.top_bottom_k, 5);
        assert_eq!(config.axis_limit, 80);
        assert_eq!(config.output, PathBuf::from("chart.svg"));
        assert_eq!(config.header_skip, 3);
        assert!(!cli.open);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn no_flags_leave_config_untouched() {
        let cli = Cli::parse_from(["enrollment_trends"]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, PipelineConfig::default());
    }
}
