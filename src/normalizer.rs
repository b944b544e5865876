//! Event Normalizer
//!
//! Drops transfers already present in the [`FingerprintStore`], converts raw
//! amounts to display amounts and renders one digest line per new transfer.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::event::TransferEvent;
use crate::store::{Fingerprint, FingerprintStore};

/// Fixed display scale applied on top of the token's own decimals
pub const DISPLAY_SCALE_DIVISOR: f64 = 100.0;

/// Language of the rendered digest lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    Chinese,
}

impl Locale {
    /// Render one digest line
    pub fn render_line(&self, from: &str, amount: &str, token: &str, to: &str) -> String {
        match self {
            Locale::English => format!("from {} sent {} {} to {}", from, amount, token, to),
            Locale::Chinese => format!("从 {} 发送了 {} 的 {} 给了 {}", from, amount, token, to),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Chinese => "zh",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Locale::English),
            "zh" | "cn" | "chinese" => Ok(Locale::Chinese),
            other => Err(format!("unknown locale '{}'", other)),
        }
    }
}

/// Human-readable summary of the transfers first seen in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    lines: Vec<String>,
}

impl Digest {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Newline-joined text sent to the analysis service
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Record unseen events in `store` and render a digest of them
///
/// # Returns
/// `None` if every event had already been seen
pub fn normalize(
    events: &[TransferEvent],
    store: &mut FingerprintStore,
    locale: Locale,
) -> Option<Digest> {
    let mut lines = Vec::new();

    for event in events {
        if !store.insert(Fingerprint::of(event)) {
            continue;
        }

        let line = locale.render_line(
            event.from_or_missing(),
            &display_amount(event),
            event.token_name_or_missing(),
            event.to_or_missing(),
        );
        debug!("New transfer: {}", line);
        lines.push(line);
    }

    if lines.is_empty() {
        debug!("No new transfers among {} events", events.len());
        return None;
    }

    info!("{} new transfers (store size {})", lines.len(), store.len());
    Some(Digest { lines })
}

/// Display amount for an event
///
/// `value / 10^tokenDecimal / 100` when both fields are integers, otherwise
/// the raw value unchanged.
pub fn display_amount(event: &TransferEvent) -> String {
    let decimals = event.token_decimals.as_deref().filter(|d| !d.is_empty());

    match (event.raw_value.as_deref(), decimals) {
        (Some(value), Some(decimals)) => match scaled_amount(value, decimals) {
            Some(amount) => format_amount(amount),
            None => value.to_string(),
        },
        _ => event.raw_value_or_missing().to_string(),
    }
}

/// Quotients this far below the value's magnitude round to zero
const UNDERFLOW_MARGIN: usize = 400;

/// Apply token decimals and the display scale
///
/// The integer division is exact before a single rounding to `f64`, so
/// values wider than 2^53 (or 2^128) keep their last digit. `None` when
/// either side is not an integer or the result overflows.
pub fn scaled_amount(value: &str, decimals: &str) -> Option<f64> {
    let (negative, digits) = integer_digits(value)?;
    let decimals: i32 = decimals.trim().parse().ok()?;

    let quotient = if decimals < 0 {
        let whole: f64 = digits.parse().ok()?;
        whole / 10f64.powf(f64::from(decimals))
    } else {
        exact_quotient(digits, decimals.unsigned_abs() as usize)?
    };

    let amount = quotient / DISPLAY_SCALE_DIVISOR;
    if !amount.is_finite() {
        return None;
    }
    Some(if negative && amount != 0.0 { -amount } else { amount })
}

/// Split an integer literal into sign and ASCII digits
fn integer_digits(value: &str) -> Option<(bool, &str)> {
    let value = value.trim();
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((negative, digits))
}

/// `digits / 10^decimals` written out as a decimal literal, then rounded once
fn exact_quotient(digits: &str, decimals: usize) -> Option<f64> {
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0.0);
    }
    if decimals > digits.len() + UNDERFLOW_MARGIN {
        return Some(0.0);
    }

    let literal = if decimals == 0 {
        digits.to_string()
    } else if digits.len() > decimals {
        let (whole, fraction) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", whole, fraction)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    };

    literal.parse().ok()
}

/// Shortest round-trip rendering, `1.0` for whole numbers and exponent
/// notation outside `1e-4..1e16`
pub fn format_amount(amount: f64) -> String {
    if amount.is_nan() {
        return "nan".to_string();
    }
    if amount.is_infinite() {
        return if amount > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if amount == 0.0 {
        return if amount.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{:e}", amount);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let plain = amount.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}
