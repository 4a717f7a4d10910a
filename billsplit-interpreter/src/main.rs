#![warn(clippy::uninlined_format_args)]

use std::{borrow::Cow, env, fs, io, process};

use billsplit_application::{BillSnapshot, SettlementReport, SettlementResult};
use billsplit_domain::{
    AllocationValidator, Bill, SplitType,
    services::{RoundingMode, SettlementContext},
};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Cow<'static, str>>;

const SCALE_VAR: &str = "BILLSPLIT_SCALE";
const ROUNDING_VAR: &str = "BILLSPLIT_ROUNDING";

fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

fn run() -> CliResult<()> {
    let Some(path) = env::args().nth(1) else {
        return Err("Usage: billsplit-interpreter <bill.json>".into());
    };

    let config = InterpreterConfig::from_env()?;

    let source =
        fs::read_to_string(&path).map_err(|err| format!("Failed to read '{path}': {err}"))?;

    let bill = BillSnapshot::from_json(&source)
        .map_err(|err| format!("Failed to decode '{path}': {err}"))?
        .into_bill();

    warn_invalid_splits(&bill);

    let result = SettlementResult::from_bill(&bill)
        .rounded(config.context)
        .map_err(|err| format!("Failed to round settlement: {err}"))?;

    let output = SettlementReport::from(&result)
        .to_json_pretty()
        .map_err(|err| format!("Failed to encode report: {err}"))?;
    println!("{output}");

    Ok(())
}

/// Custom splits still settle proportionally; this only reports them.
fn warn_invalid_splits(bill: &Bill) {
    let validator = AllocationValidator;
    for item in bill
        .items
        .iter()
        .filter(|item| item.split_type != SplitType::Equal && item.is_assigned())
    {
        if !validator.validate(Some(item.consumed_by.as_slice()), item.split_type) {
            tracing::warn!(
                item_id = %item.id,
                split_type = %item.split_type,
                "Custom split does not validate; shares are normalized by the actual total"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InterpreterConfig {
    context: SettlementContext,
}

impl InterpreterConfig {
    fn from_env() -> CliResult<Self> {
        Self::from_values(
            env::var(SCALE_VAR).ok().as_deref(),
            env::var(ROUNDING_VAR).ok().as_deref(),
        )
    }

    fn from_values(scale: Option<&str>, rounding: Option<&str>) -> CliResult<Self> {
        let mut context = SettlementContext::cents();

        if let Some(scale) = scale.map(str::trim).filter(|value| !value.is_empty()) {
            context.scale = scale
                .parse()
                .map_err(|_| format!("{SCALE_VAR} must be a non-negative integer, got '{scale}'"))?;
        }

        if let Some(rounding) = rounding.map(str::trim).filter(|value| !value.is_empty()) {
            context.rounding_mode = parse_rounding_mode(rounding)?;
        }

        Ok(Self { context })
    }
}

fn parse_rounding_mode(value: &str) -> CliResult<RoundingMode> {
    match value.to_ascii_lowercase().as_str() {
        "half-up" | "half_up" => Ok(RoundingMode::HalfUp),
        "half-even" | "half_even" | "bankers" => Ok(RoundingMode::HalfEven),
        _ => Err(format!(
            "{ROUNDING_VAR} must be 'half-up' or 'half-even', got '{value}'"
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(None, None, 2, RoundingMode::HalfUp)]
    #[case::blank(Some("  "), Some(""), 2, RoundingMode::HalfUp)]
    #[case::yen(Some("0"), None, 0, RoundingMode::HalfUp)]
    #[case::bankers(Some("3"), Some("Half-Even"), 3, RoundingMode::HalfEven)]
    fn reads_rounding_settings(
        #[case] scale: Option<&str>,
        #[case] rounding: Option<&str>,
        #[case] expected_scale: u32,
        #[case] expected_mode: RoundingMode,
    ) {
        let config = InterpreterConfig::from_values(scale, rounding).expect("valid config");
        assert_eq!(config.context.scale, expected_scale);
        assert_eq!(config.context.rounding_mode, expected_mode);
    }

    #[rstest]
    #[case::negative_scale(Some("-1"), None)]
    #[case::word_scale(Some("two"), None)]
    #[case::unknown_mode(None, Some("floor"))]
    fn rejects_bad_settings(#[case] scale: Option<&str>, #[case] rounding: Option<&str>) {
        assert!(InterpreterConfig::from_values(scale, rounding).is_err());
    }
}
