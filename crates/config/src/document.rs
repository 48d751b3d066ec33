//! INI document model
//!
//! An [`IniDocument`] keeps sections and options in file order. Comments are
//! dropped on parse; [`commented_options`] recovers the `#key = value` lines
//! that templates use to document defaults.

use std::fmt;
use types::ConfigError;

/// Section whose keys are namespace prefixes and keep their case
pub const CASE_SENSITIVE_SECTION: &str = "ns_prefix";

/// A named section and its options, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options as `(key, value)` pairs
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Option names compare case-insensitively, except namespace prefixes
    fn position(&self, key: &str) -> Option<usize> {
        if self.name == CASE_SENSITIVE_SECTION {
            self.entries.iter().position(|(k, _)| k == key)
        } else {
            self.entries
                .iter()
                .position(|(k, _)| k.eq_ignore_ascii_case(key))
        }
    }
}

/// An ordered set of uniquely named sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

/// A commented-out option found in a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentedOption {
    pub section: String,
    pub key: String,
    pub value: String,
    pub line: usize,
}

enum Line<'a> {
    Blank,
    Header(&'a str),
    Option(&'a str, &'a str),
    Continuation(&'a str),
    Invalid,
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

fn split_option(text: &str) -> Option<(&str, &str)> {
    let idx = text.find(['=', ':'])?;
    let key = text[..idx].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, text[idx + 1..].trim()))
}

fn classify(raw: &str) -> Line<'_> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_comment(trimmed) {
        return Line::Blank;
    }
    if raw.starts_with([' ', '\t']) {
        return Line::Continuation(trimmed);
    }
    if let Some(inner) = trimmed.strip_prefix('[') {
        return match inner.strip_suffix(']') {
            Some(name) if !name.trim().is_empty() => Line::Header(name.trim()),
            _ => Line::Invalid,
        };
    }
    match split_option(trimmed) {
        Some((key, value)) => Line::Option(key, value),
        None => Line::Invalid,
    }
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut doc = IniDocument::new();
        // index of the option a continuation line would extend
        let mut last_option: Option<(usize, usize)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            match classify(raw) {
                Line::Blank => {}
                Line::Header(name) => {
                    if doc.contains_section(name) {
                        return Err(ConfigError::DuplicateSection {
                            line,
                            section: name.to_string(),
                        });
                    }
                    doc.sections.push(Section::new(name));
                    last_option = None;
                }
                Line::Option(key, value) => {
                    let section_idx = match doc.sections.len() {
                        0 => {
                            return Err(ConfigError::OptionOutsideSection {
                                line,
                                key: key.to_string(),
                            })
                        }
                        n => n - 1,
                    };
                    let section = &mut doc.sections[section_idx];
                    if section.position(key).is_some() {
                        return Err(ConfigError::DuplicateOption {
                            line,
                            section: section.name.clone(),
                            key: key.to_string(),
                        });
                    }
                    section.entries.push((key.to_string(), value.to_string()));
                    last_option = Some((section_idx, section.entries.len() - 1));
                }
                Line::Continuation(content) => match last_option {
                    Some((s, e)) => {
                        let value = &mut doc.sections[s].entries[e].1;
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(content);
                    }
                    None => {
                        return Err(ConfigError::Syntax {
                            line,
                            content: raw.to_string(),
                        })
                    }
                },
                Line::Invalid => {
                    return Err(ConfigError::Syntax {
                        line,
                        content: raw.to_string(),
                    })
                }
            }
        }

        Ok(doc)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn contains_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    /// Set an option, creating the section at the end if needed
    ///
    /// Returns the previous value.
    pub fn set(
        &mut self,
        section: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        let key = key.into();
        let value = value.into();
        let idx = match self.sections.iter().position(|s| s.name == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(section));
                self.sections.len() - 1
            }
        };
        let section = &mut self.sections[idx];
        match section.position(&key) {
            Some(pos) => Some(std::mem::replace(&mut section.entries[pos].1, value)),
            None => {
                section.entries.push((key, value));
                None
            }
        }
    }

    /// Add an empty section if it does not exist yet
    pub fn add_section(&mut self, name: &str) {
        if !self.contains_section(name) {
            self.sections.push(Section::new(name));
        }
    }

    /// Remove an option, returning its value
    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        let section = self.sections.iter_mut().find(|s| s.name == section)?;
        let pos = section.position(key)?;
        Some(section.entries.remove(pos).1)
    }

    /// Every `(section, key, value)` triple in document order
    pub fn effective_pairs(&self) -> Vec<(&str, &str, &str)> {
        self.sections
            .iter()
            .flat_map(|s| s.entries().map(move |(k, v)| (s.name(), k, v)))
            .collect()
    }

    /// Serialize without comments
    pub fn to_ini_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in section.entries() {
                let mut lines = value.split('\n');
                match lines.next() {
                    Some(first) if !first.is_empty() => writeln!(f, "{} = {}", key, first)?,
                    _ => writeln!(f, "{} =", key)?,
                }
                for rest in lines {
                    writeln!(f, "    {}", rest)?;
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for IniDocument {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IniDocument::parse(s)
    }
}

/// Find the `#key = value` lines of a commented template
///
/// Only lines that follow a section header are reported. Prose comments are
/// told apart from options by requiring the key to be a single token.
pub fn commented_options(text: &str) -> Vec<CommentedOption> {
    let mut found = Vec::new();
    let mut current: Option<&str> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if let Line::Header(name) = classify(raw) {
            current = Some(name);
            continue;
        }
        let Some(section) = current else { continue };
        let Some(body) = trimmed.strip_prefix('#') else {
            continue;
        };
        let body = body.trim_start_matches('#').trim();
        let Some(idx_eq) = body.find('=') else { continue };
        let key = body[..idx_eq].trim();
        if key.is_empty() || key.contains(char::is_whitespace) || key.contains(':') {
            continue;
        }
        found.push(CommentedOption {
            section: section.to_string(),
            key: key.to_string(),
            value: body[idx_eq + 1..].trim().to_string(),
            line: idx + 1,
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# leading comment
[server]
host-name = localhost
port: 8001
; another comment

[logging]
loggers = ktbs
    rdfrest
console-level =
";

    #[test]
    fn test_parse_sections_and_options() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        let names: Vec<_> = doc.sections().map(Section::name).collect();
        assert_eq!(names, vec!["server", "logging"]);
        assert_eq!(doc.get("server", "host-name"), Some("localhost"));
        assert_eq!(doc.get("server", "port"), Some("8001"));
        assert_eq!(doc.get("logging", "loggers"), Some("ktbs\nrdfrest"));
        assert_eq!(doc.get("logging", "console-level"), Some(""));
        assert_eq!(doc.get("logging", "missing"), None);
    }

    #[test]
    fn test_first_delimiter_wins() {
        let doc = IniDocument::parse("[x]\nurl = http://example.org/a:b\n").unwrap();
        assert_eq!(doc.get("x", "url"), Some("http://example.org/a:b"));
    }

    #[test]
    fn test_duplicate_section_is_rejected() {
        let err = IniDocument::parse("[server]\n[plugins]\n[server]\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateSection {
                line: 3,
                section: "server".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_option_is_rejected() {
        let err = IniDocument::parse("[server]\nport = 1\nport = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOption { line: 3, .. }));
    }

    #[test]
    fn test_duplicate_option_ignores_case() {
        let err = IniDocument::parse("[server]\nport = 8080\nPORT = 9090\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateOption {
                line: 3,
                section: "server".to_string(),
                key: "PORT".to_string(),
            }
        );

        let doc = IniDocument::parse("[server]\nHost-Name = example.org\n").unwrap();
        assert_eq!(doc.get("server", "host-name"), Some("example.org"));
    }

    #[test]
    fn test_prefixes_keep_their_case() {
        let doc = IniDocument::parse(
            "[ns_prefix]\nfoaf = http://xmlns.com/foaf/0.1/\nFOAF = http://example.org/foaf#\n",
        )
        .unwrap();
        assert_eq!(doc.get("ns_prefix", "FOAF"), Some("http://example.org/foaf#"));
        assert_eq!(doc.effective_pairs().len(), 2);
    }

    #[test]
    fn test_option_outside_section() {
        let err = IniDocument::parse("port = 1\n[server]\n").unwrap_err();
        assert!(matches!(err, ConfigError::OptionOutsideSection { line: 1, .. }));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            IniDocument::parse("[server\n").unwrap_err(),
            ConfigError::Syntax { line: 1, .. }
        ));
        assert!(matches!(
            IniDocument::parse("[server]\njust words\n").unwrap_err(),
            ConfigError::Syntax { line: 2, .. }
        ));
        assert!(matches!(
            IniDocument::parse("  indented\n").unwrap_err(),
            ConfigError::Syntax { line: 1, .. }
        ));
    }

    #[test]
    fn test_set_and_remove_keep_order() {
        let mut doc = IniDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.set("server", "port", "9000"), Some("8001".to_string()));
        assert_eq!(doc.set("cors", "allow-origin", "*"), None);
        assert_eq!(doc.remove("server", "host-name"), Some("localhost".to_string()));
        assert_eq!(doc.remove("server", "host-name"), None);

        let pairs = doc.effective_pairs();
        assert_eq!(pairs[0], ("server", "port", "9000"));
        assert_eq!(pairs.last(), Some(&("cors", "allow-origin", "*")));
    }

    #[test]
    fn test_serialization_round_trip() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        let text = doc.to_ini_string();
        assert!(!text.contains('#'));
        let reparsed: IniDocument = text.parse().unwrap();
        assert_eq!(reparsed.effective_pairs(), doc.effective_pairs());
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_commented_options() {
        let text = "\
# Header prose = ignored, no section yet
[server]
# The port to listen to
#port = 8001
# host-name = localhost
# see: http://example.org = not an option
[plugins]
#cors = false
";
        let found = commented_options(text);
        let keys: Vec<_> = found
            .iter()
            .map(|c| (c.section.as_str(), c.key.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("server", "port", "8001"),
                ("server", "host-name", "localhost"),
                ("plugins", "cors", "false"),
            ]
        );
        assert_eq!(found[0].line, 4);
    }
}
