//! Front-matter parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

lazy_static! {
    /// A `key:` line, the marker of YAML front-matter as opposed to prose
    static ref YAML_KEY_LINE: Regex = Regex::new(r"^([A-Za-z0-9_-]+):(?:\s|$)").unwrap();
}

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Accepts any scalar (string, number, bool) as a string.
///
/// YAML happily types `title: 2024` as an integer; we only care about the text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct Scalar;

    impl<'de> Visitor<'de> for Scalar {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Scalar)
}

/// Front-matter data from a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    /// Explicit identifier, overrides the one derived from the file name
    #[serde(deserialize_with = "scalar_string")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Split a document into front-matter and body.
    ///
    /// Never fails: a missing or malformed block yields the default
    /// front-matter and the whole document as body.
    pub fn parse(content: &str) -> (Self, &str) {
        let trimmed = content.trim_start_matches('\u{feff}').trim_start();

        // YAML front-matter (---)
        if trimmed.starts_with("---") {
            return Self::parse_yaml(trimmed, content);
        }

        // JSON front-matter (;;; or {"key":)
        if trimmed.starts_with(";;;") || trimmed.starts_with('{') {
            return Self::parse_json(trimmed, content);
        }

        tracing::debug!("No front-matter block found");
        (FrontMatter::default(), content)
    }

    /// `block` starts at the opening marker; `content` is the whole document
    fn parse_yaml<'a>(block: &'a str, content: &'a str) -> (Self, &'a str) {
        let rest = &block[3..];
        // The opening marker must be a line on its own
        if !rest.trim_start_matches([' ', '\t']).starts_with(['\n', '\r']) {
            return (FrontMatter::default(), content);
        }
        let rest = rest.trim_start_matches([' ', '\t', '\n', '\r']);

        let Some(end_pos) = find_closing_marker(rest) else {
            tracing::warn!("Front-matter block is not closed, treating as content");
            return (FrontMatter::default(), content);
        };

        let yaml_content = &rest[..end_pos.start];
        let remaining = rest[end_pos.end..].trim_start_matches(['\n', '\r']);

        if yaml_content.trim().is_empty() {
            return (FrontMatter::default(), remaining);
        }

        // Markdown that merely uses `---` as a rule must not be eaten
        let has_yaml_structure = yaml_content.lines().any(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return false;
            }
            YAML_KEY_LINE
                .captures(trimmed)
                .map(|caps| !matches!(&caps[1], "http" | "https" | "ftp"))
                .unwrap_or(false)
        });

        if !has_yaml_structure {
            return (FrontMatter::default(), content);
        }

        match serde_yaml::from_str::<FrontMatter>(yaml_content) {
            Ok(fm) => (fm, remaining),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse YAML front-matter, treating as content: {}",
                    e
                );
                (FrontMatter::default(), content)
            }
        }
    }

    fn parse_json<'a>(block: &'a str, content: &'a str) -> (Self, &'a str) {
        // JSON front-matter ends with ;;;
        if let Some(rest) = block.strip_prefix(";;;") {
            if let Some(end_pos) = rest.find(";;;") {
                let json_content = &rest[..end_pos];
                let remaining = rest[end_pos + 3..].trim_start_matches(['\n', '\r']);
                return Self::from_json(json_content, remaining, content);
            }
            return (FrontMatter::default(), content);
        }

        // A JSON object at the start, find the matching closing brace
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end_pos = None;
        for (i, c) in block.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end_pos = Some(i + 1);
                        break;
                    }
                }
                _ => {}
            }
        }

        match end_pos {
            Some(end) => {
                let remaining = block[end..].trim_start_matches(['\n', '\r']);
                Self::from_json(&block[..end], remaining, content)
            }
            None => (FrontMatter::default(), content),
        }
    }

    fn from_json<'a>(json: &str, remaining: &'a str, original: &'a str) -> (Self, &'a str) {
        match serde_json::from_str::<FrontMatter>(json) {
            Ok(fm) => (fm, remaining),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse JSON front-matter, treating as content: {}",
                    e
                );
                (FrontMatter::default(), original)
            }
        }
    }

    /// Parse the date string, `None` when absent or unrecognised
    pub fn parse_date(&self) -> Option<NaiveDateTime> {
        let raw = self.date.as_deref()?;
        let parsed = parse_date_string(raw);
        if parsed.is_none() {
            tracing::warn!("Unrecognised date {:?}, treating as missing", raw);
        }
        parsed
    }
}

/// Byte range of the closing `---` line within `rest`
fn find_closing_marker(rest: &str) -> Option<std::ops::Range<usize>> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(offset..offset + line.len());
        }
        offset += line.len();
    }
    None
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_utc());
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}
