use regex::{Regex, RegexBuilder};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    DisplayName,
    MessageBody,
}

#[derive(Debug, Clone)]
pub struct BlacklistRule {
    pub pattern: String,
    pub scope: FilterScope,
    regex: Regex,
}

impl BlacklistRule {

    pub fn new(pattern: &str, scope: FilterScope) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()?;
        Ok(BlacklistRule { pattern: pattern.to_string(), scope, regex })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

}

/// Ordered blacklist. The first matching rule wins, not the most specific one.
#[derive(Debug, Clone, Default)]
pub struct ChatFilter {
    name_rules: Vec<BlacklistRule>,
    message_rules: Vec<BlacklistRule>,
}

impl ChatFilter {

    pub fn new(name_patterns: &[String], message_patterns: &[String]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String], scope| patterns.iter()
            .map(|pattern| BlacklistRule::new(pattern, scope))
            .collect::<Result<Vec<_>, _>>();
        Ok(ChatFilter {
            name_rules: compile(name_patterns, FilterScope::DisplayName)?,
            message_rules: compile(message_patterns, FilterScope::MessageBody)?,
        })
    }

    pub fn match_name(&self, name: &str) -> Option<&BlacklistRule> {
        self.name_rules.iter().find(|rule| rule.is_match(name))
    }

    pub fn match_message(&self, body: &str) -> Option<&BlacklistRule> {
        self.message_rules.iter().find(|rule| rule.is_match(body))
    }

}

/// Returns the display name of the first administrator contained in `name`.
pub fn impersonated_name<'a>(name: &str, admin_names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let name = name.to_lowercase();
    admin_names.into_iter()
        .filter(|admin| !admin.trim().is_empty())
        .find(|admin| name.contains(&admin.to_lowercase()))
}
