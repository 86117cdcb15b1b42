//! Per-field display translators
//!
//! Some API fields have a representation nobody wants to type into a cell:
//! dates are `{year, month, day}` objects and money is an integer count of
//! micros. A [`Translator`] converts between the cell text and the API value
//! for one field path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Two-way conversion between a cell and an API field value
pub trait Translator: std::fmt::Debug + Send + Sync {
    /// Convert a parsed cell value into the API representation
    fn to_entity(&self, value: Value) -> Value;

    /// Render an API value for display, or `None` to use the default rendering
    fn to_display(&self, value: &Value) -> Option<String>;
}

/// Built-in translators selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    /// `2024-01-05` <-> `{"year": 2024, "month": 1, "day": 5}`
    Date,
    /// `1.5` <-> `"1500000"`
    Micros,
}

impl TranslatorKind {
    /// Parse a configuration name (`date`, `micros`)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "date" => Some(TranslatorKind::Date),
            "micros" => Some(TranslatorKind::Micros),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TranslatorKind::Date => "date",
            TranslatorKind::Micros => "micros",
        }
    }

    pub fn build(&self) -> Arc<dyn Translator> {
        match self {
            TranslatorKind::Date => Arc::new(DateTranslator),
            TranslatorKind::Micros => Arc::new(MicrosTranslator),
        }
    }
}

/// Human dates to API date objects
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTranslator;

impl Translator for DateTranslator {
    fn to_entity(&self, value: Value) -> Value {
        let Some(text) = value.as_str() else {
            return value;
        };

        match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            Ok(date) => json!({
                "year": date.year(),
                "month": date.month(),
                "day": date.day(),
            }),
            Err(_) => value,
        }
    }

    fn to_display(&self, value: &Value) -> Option<String> {
        let part = |name: &str| value.get(name).and_then(Value::as_i64);
        let (year, month, day) = (part("year")?, part("month")?, part("day")?);

        let date = NaiveDate::from_ymd_opt(
            i32::try_from(year).ok()?,
            u32::try_from(month).ok()?,
            u32::try_from(day).ok()?,
        )?;
        Some(date.format("%Y-%m-%d").to_string())
    }
}

/// Currency units to integer micros (sent as strings, like every int64 in the API)
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrosTranslator;

impl Translator for MicrosTranslator {
    fn to_entity(&self, value: Value) -> Value {
        let text = match &value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return value,
        };

        match units_to_micros(&text) {
            Some(micros) => Value::String(micros.to_string()),
            None => value,
        }
    }

    fn to_display(&self, value: &Value) -> Option<String> {
        let micros = match value {
            Value::String(s) => s.trim().parse::<i64>().ok()?,
            Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        Some(micros_to_units(micros))
    }
}

/// Parse a decimal amount (at most six fractional digits) into micros
fn units_to_micros(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 6 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    if whole < 0 {
        return None;
    }
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<6}", fraction).parse().ok()?
    };

    let micros = whole.checked_mul(MICROS_PER_UNIT)?.checked_add(fraction)?;
    Some(if negative { -micros } else { micros })
}

fn micros_to_units(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let unit = MICROS_PER_UNIT.unsigned_abs();
    let (whole, fraction) = (abs / unit, abs % unit);

    if fraction == 0 {
        format!("{}{}", sign, whole)
    } else {
        let fraction = format!("{:06}", fraction);
        format!("{}{}.{}", sign, whole, fraction.trim_end_matches('0'))
    }
}

/// Translators keyed by dotted field path
#[derive(Debug, Clone, Default)]
pub struct TranslatorSet {
    by_path: HashMap<String, Arc<dyn Translator>>,
}

impl TranslatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a translator for a field path, replacing any previous one
    pub fn insert(&mut self, field_path: impl Into<String>, translator: Arc<dyn Translator>) {
        self.by_path.insert(field_path.into(), translator);
    }

    /// Builder-style registration of a built-in translator
    pub fn with(mut self, field_path: impl Into<String>, kind: TranslatorKind) -> Self {
        self.insert(field_path, kind.build());
        self
    }

    /// Stop translating a field path
    pub fn remove(&mut self, field_path: &str) {
        self.by_path.remove(field_path);
    }

    pub fn get(&self, field_path: &str) -> Option<&Arc<dyn Translator>> {
        self.by_path.get(field_path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
