use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;
use trading_core::{TradeAction, TradeDecision, ValidationError};

/// Validates raw decision-oracle output into structured [`TradeDecision`]s.
///
/// Oracles are prompted to return bare JSON, but in practice wrap it in
/// prose, markdown fences, or confirmation chatter. The validator extracts
/// the first balanced JSON object from the text and checks it field by
/// field. Pure: identical input always yields an identical decision or an
/// identical error kind.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate raw oracle text into a decision stamped with the simulated
    /// day it was made on.
    pub fn validate(
        &self,
        raw_text: &str,
        timestamp: NaiveDate,
    ) -> Result<TradeDecision, ValidationError> {
        let payload = extract_json_object(raw_text).ok_or(ValidationError::NoPayload)?;
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

        let action_raw = require_field(&value, "action")?;
        let action_str = action_raw
            .as_str()
            .ok_or_else(|| ValidationError::InvalidAction(action_raw.to_string()))?;
        let action = TradeAction::parse(action_str)
            .ok_or_else(|| ValidationError::InvalidAction(action_str.to_string()))?;

        let ticker = normalize_ticker(require_field(&value, "ticker")?)?;
        let amount = parse_amount(require_field(&value, "amount")?)?;

        let confidence = parse_f64(require_field(&value, "confidence")?, "confidence")?;
        if !(0.0..=1.0).contains(&confidence) {
            // Rejected, never clamped.
            return Err(ValidationError::OutOfRange {
                field: "confidence",
                value: confidence,
            });
        }

        let expected_profit_percentage = match value.get("expected_profit_percentage") {
            Some(v) => {
                let pct = parse_f64(v, "expected_profit_percentage")?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(ValidationError::OutOfRange {
                        field: "expected_profit_percentage",
                        value: pct,
                    });
                }
                pct
            }
            None => 0.0,
        };

        let reasoning = value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(TradeDecision {
            action,
            ticker,
            amount,
            expected_profit_percentage,
            confidence,
            reasoning,
            timestamp,
        })
    }
}

/// Load a previously written decision-log JSON array and check its basic
/// structure (every entry carries action/ticker/amount).
pub fn load_decision_log(path: &Path) -> anyhow::Result<Vec<TradeDecision>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading decision log {}", path.display()))?;
    let decisions: Vec<TradeDecision> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing decision log {}", path.display()))?;

    for (i, d) in decisions.iter().enumerate() {
        if d.amount == 0 {
            anyhow::bail!("decision {} in {}: amount must be positive", i, path.display());
        }
        if d.ticker.is_empty() {
            anyhow::bail!("decision {} in {}: empty ticker", i, path.display());
        }
    }
    tracing::debug!(path = %path.display(), count = decisions.len(), "loaded decision log");
    Ok(decisions)
}

/// Find the first balanced `{...}` object in the text, honoring string
/// literals and escapes so braces inside reasoning strings don't truncate
/// the payload.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn require_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a Value, ValidationError> {
    match value.get(field) {
        Some(Value::Null) | None => Err(ValidationError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

/// Positive integer, accepting JSON numbers and numeric strings.
fn parse_amount(value: &Value) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidAmount(value.to_string());
    let amount = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                i
            } else if let Some(f) = n.as_f64() {
                // Tolerate "10.0" but not "10.5".
                if f > 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
                    f as u64
                } else {
                    return Err(invalid());
                }
            } else {
                return Err(invalid());
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if amount == 0 {
        return Err(invalid());
    }
    u32::try_from(amount).map_err(|_| invalid())
}

fn parse_f64(value: &Value, field: &'static str) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(ValidationError::OutOfRange {
            field,
            value: f64::NAN,
        }),
    }
}

fn normalize_ticker(value: &Value) -> Result<String, ValidationError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ValidationError::InvalidTicker(value.to_string()))?;
    let ticker = raw.trim().to_uppercase();
    let valid = (1..=5).contains(&ticker.len())
        && ticker.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(ticker)
    } else {
        Err(ValidationError::InvalidTicker(raw.to_string()))
    }
}
