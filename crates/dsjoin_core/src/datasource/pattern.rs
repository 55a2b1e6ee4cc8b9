//! Wildcard pattern matching for in-process datasources.
//!
//! A pattern is matched case-insensitively against the whole value. One
//! leading and one trailing `*` act as wildcards; any other `*` is literal.

use crate::datasource::QueryPart;
use regex::{Regex, RegexBuilder};

/// Compiled form of one `QueryPart`.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    column: String,
    regex: Regex,
}

impl PatternMatcher {
    pub fn compile(part: &QueryPart) -> Result<Self, regex::Error> {
        let mut core = part.pattern.as_str();
        let leading = core.starts_with('*');
        if leading {
            core = &core[1..];
        }
        let trailing = core.ends_with('*');
        if trailing {
            core = &core[..core.len() - 1];
        }

        let expression = format!(
            "^{}{}{}$",
            if leading { ".*" } else { "" },
            regex::escape(core),
            if trailing { ".*" } else { "" }
        );
        let regex = RegexBuilder::new(&expression)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;

        Ok(Self {
            column: part.column.clone(),
            regex,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

#[cfg(test)]
mod tests {
    use super::PatternMatcher;
    use crate::datasource::QueryPart;

    fn matcher(pattern: &str) -> PatternMatcher {
        PatternMatcher::compile(&QueryPart::new("Nachname", pattern)).unwrap()
    }

    #[test]
    fn wildcards_match_prefix_suffix_and_infix() {
        assert!(matcher("Mei*").is_match("Meier"));
        assert!(!matcher("Mei*").is_match("Schmidt"));
        assert!(matcher("*er").is_match("Meier"));
        assert!(matcher("*ei*").is_match("Meier"));
        assert!(!matcher("Mei").is_match("Meier"));
    }

    #[test]
    fn matching_ignores_case_and_escapes_regex_syntax() {
        assert!(matcher("meier").is_match("MEIER"));
        assert!(matcher("a.b*").is_match("a.bc"));
        assert!(!matcher("a.b*").is_match("axbc"));
    }
}
