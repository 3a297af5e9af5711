use crate::core::error::Result;
use regex::{Regex, RegexBuilder};

/// Wildcard accepted in search strings, standing for any run of characters
pub const WILDCARD: char = '*';

/// A compiled filename matcher.
///
/// The search string `foo*bar` becomes the anchored expression
/// `^.*foo.*bar.*$`: literal segments must appear in order somewhere in the
/// filename. Everything except `*` is matched literally.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    source: String,
    regex: Regex,
    literal_len: usize,
}

impl FilenamePattern {
    /// Compile a search string.
    ///
    /// Returns `Ok(None)` for an empty or absent search string, which callers
    /// treat as "nothing to search for".
    pub fn compile(search: Option<&str>, case_sensitive: bool) -> Result<Option<Self>> {
        let source = match search {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };

        let body = source
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let expression = format!("^.*{}.*$", body);

        let regex = RegexBuilder::new(&expression)
            .case_insensitive(!case_sensitive)
            .dot_matches_new_line(true)
            .build()?;

        Ok(Some(Self {
            source: source.to_string(),
            regex,
            literal_len: source.chars().filter(|c| *c != WILDCARD).count(),
        }))
    }

    /// The search string this pattern was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The anchored regular expression used for matching
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    /// Relevance of a matching filename: the share of it covered by the
    /// literal part of the search string. Tighter matches score higher.
    pub fn score(&self, filename: &str) -> f32 {
        let len = filename.chars().count();
        if len == 0 {
            return 0.0;
        }
        (self.literal_len as f32 / len as f32).min(1.0)
    }
}
