//! Lenient option values
//!
//! INI files only carry strings, while environment variables and JSON
//! overrides arrive already typed. The deserializers here accept both, so a
//! schema field reads the same whichever layer set it.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a boolean the way INI files spell them
///
/// Accepts `1`, `yes`, `true`, `on` and `0`, `no`, `false`, `off`,
/// case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an optional size limit where `-1` (or nothing) means unlimited
pub fn parse_limit(value: &str) -> Result<Option<u64>, String> {
    let value = value.trim();
    if value.is_empty() || value == "-1" {
        return Ok(None);
    }
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| format!("expected a non-negative integer or -1, got {:?}", value))
}

/// Split a space-separated list
pub fn parse_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raw::Bool(b) => write!(f, "{}", b),
            Raw::Int(i) => write!(f, "{}", i),
            Raw::UInt(u) => write!(f, "{}", u),
            Raw::Float(x) => write!(f, "{}", x),
            Raw::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Deserialize a boolean from a native bool, `0`/`1`, or an INI spelling
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(0) => Ok(false),
        Raw::Int(1) => Ok(true),
        Raw::Text(s) => parse_bool(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid boolean: {:?}", s))),
        other => Err(de::Error::custom(format!("invalid boolean: {}", other))),
    }
}

/// Deserialize any `FromStr` value from its text or a native scalar
pub fn parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Raw::deserialize(deserializer)?;
    if let Raw::Bool(_) = raw {
        return Err(de::Error::custom(format!("unexpected boolean: {}", raw)));
    }
    let text = raw.to_string();
    text.trim()
        .parse::<T>()
        .map_err(|e| de::Error::custom(format!("invalid value {:?}: {}", text, e)))
}

/// Deserialize an optional limit, `-1` or empty meaning none
pub fn limit<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Raw>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(Raw::Bool(b)) => Err(de::Error::custom(format!("unexpected boolean: {}", b))),
        Some(raw) => parse_limit(&raw.to_string()).map_err(de::Error::custom),
    }
}

/// Serialize an optional limit back to its `-1` spelling
pub fn serialize_limit<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(n) => serializer.serialize_u64(*n),
        None => serializer.serialize_i64(-1),
    }
}

/// Deserialize a word list from a space-separated string or a sequence
pub fn words<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Words {
        Text(String),
        List(Vec<String>),
    }

    Ok(match Words::deserialize(deserializer)? {
        Words::Text(s) => parse_words(&s),
        Words::List(list) => list
            .iter()
            .flat_map(|item| parse_words(item))
            .collect(),
    })
}

/// Deserialize optional text where an empty string means absent
///
/// Scalars typed by an upper layer (`2024` from the environment) read back
/// as their text.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Raw>::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.to_string().trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// A boolean read with [`flag`], usable as a map value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        flag(deserializer).map(Flag)
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

/// Log levels as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by tracing filters
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" | "FATAL" => Ok(LogLevel::Critical),
            other => Err(format!(
                "unknown log level {:?} (expected DEBUG, INFO, WARNING, ERROR or CRITICAL)",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        parsed(deserializer)
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Console log output styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Full => "full",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format {:?} (expected full, compact, pretty or json)",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for LogFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        text.parse().map_err(de::Error::custom)
    }
}

impl Serialize for LogFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
