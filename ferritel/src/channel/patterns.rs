//! Login prompt detection rules.
//!
//! Raw-mode scanning checks an ordered table of rules and acts on the first
//! rule whose pattern matches. The default order is login, password,
//! shell prompt, greeting.

use indexmap::IndexMap;
use regex::bytes::Regex;

/// What to do when a login rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    /// Send the configured username.
    SendUsername,

    /// Send the configured password.
    SendPassword,

    /// Login finished; switch to line mode.
    Ready,
}

/// A single `(pattern, action)` entry.
#[derive(Debug, Clone)]
pub struct LoginRule {
    pub pattern: Regex,
    pub action: LoginAction,
}

/// Ordered login rules, keyed by name.
///
/// Replacing a rule by name keeps its position in the precedence order.
#[derive(Debug, Clone)]
pub struct LoginRules {
    rules: IndexMap<String, LoginRule>,
}

impl LoginRules {
    pub const LOGIN: &'static str = "login";
    pub const PASSWORD: &'static str = "password";
    pub const PROMPT: &'static str = "prompt";
    pub const GREETING: &'static str = "greeting";

    /// Build the default table for a shell prompt and optional greeting.
    pub fn new(prompt: &str, greeting: Option<&str>) -> Result<Self, regex::Error> {
        let mut rules = Self {
            rules: IndexMap::new(),
        }
        .with_rule(Self::LOGIN, r"[Ll]ogin:\s*$", LoginAction::SendUsername)?
        .with_rule(Self::PASSWORD, r"[Pp]assword:\s*$", LoginAction::SendPassword)?;

        rules.insert(Self::PROMPT, compile_prompt_pattern(prompt)?, LoginAction::Ready);

        if let Some(greeting) = greeting.filter(|g| !g.is_empty()) {
            rules = rules.with_rule(Self::GREETING, greeting, LoginAction::Ready)?;
        }

        Ok(rules)
    }

    /// Add or replace a rule. New rules go last.
    pub fn with_rule(
        mut self,
        name: impl Into<String>,
        pattern: &str,
        action: LoginAction,
    ) -> Result<Self, regex::Error> {
        self.insert(name, Regex::new(pattern)?, action);
        Ok(self)
    }

    fn insert(&mut self, name: impl Into<String>, pattern: Regex, action: LoginAction) {
        self.rules.insert(name.into(), LoginRule { pattern, action });
    }

    /// First rule, in precedence order, whose pattern matches `data`.
    pub fn first_match(&self, data: &[u8]) -> Option<(&str, &LoginRule)> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.pattern.is_match(data))
            .map(|(name, rule)| (name.as_str(), rule))
    }

    /// Rule names in precedence order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compile a shell prompt pattern.
///
/// A bare `$` would only ever match end-of-input, so it is taken as the
/// literal dollar sign. Anything else is a regex.
pub fn compile_prompt_pattern(prompt: &str) -> Result<Regex, regex::Error> {
    if prompt.trim() == "$" {
        Regex::new(&regex::escape("$"))
    } else {
        Regex::new(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_precedence() {
        let rules = LoginRules::new("$", Some("Welcome")).unwrap();
        let names: Vec<&str> = rules.names().collect();
        assert_eq!(names, vec!["login", "password", "prompt", "greeting"]);
    }

    #[test]
    fn test_login_and_password_match() {
        let rules = LoginRules::new("$", None).unwrap();

        let (name, rule) = rules.first_match(b"Ubuntu 22.04\r\nhost login: ").unwrap();
        assert_eq!(name, "login");
        assert_eq!(rule.action, LoginAction::SendUsername);

        let (_, rule) = rules.first_match(b"Password: ").unwrap();
        assert_eq!(rule.action, LoginAction::SendPassword);

        // Only the first letter is case-insensitive
        assert!(rules.first_match(b"LOGIN: ").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        // A prompt regex that would also match a password prompt loses to it
        let rules = LoginRules::new(r":\s*$", None).unwrap();
        let (name, _) = rules.first_match(b"password: ").unwrap();
        assert_eq!(name, "password");
    }

    #[test]
    fn test_login_prompt_must_be_at_end() {
        let rules = LoginRules::new("#", None).unwrap();
        assert!(rules.first_match(b"Last login: Mon Jan 1 on pts/0\r\n").is_none());
    }

    #[test]
    fn test_dollar_prompt_is_literal() {
        let pattern = compile_prompt_pattern(" $ ").unwrap();
        assert!(pattern.is_match(b"user@host:~$ "));
        assert!(!pattern.is_match(b"user@host:~# "));

        let pattern = compile_prompt_pattern(r"[#>]\s*$").unwrap();
        assert!(pattern.is_match(b"router> "));
    }

    #[test]
    fn test_empty_greeting_ignored() {
        let rules = LoginRules::new("$", Some("")).unwrap();
        assert_eq!(rules.len(), 3);
        assert!(!rules.names().any(|name| name == LoginRules::GREETING));
    }

    #[test]
    fn test_replace_rule_keeps_position() {
        let rules = LoginRules::new("$", None)
            .unwrap()
            .with_rule(LoginRules::LOGIN, r"[Uu]sername:\s*$", LoginAction::SendUsername)
            .unwrap();

        let names: Vec<&str> = rules.names().collect();
        assert_eq!(names, vec!["login", "password", "prompt"]);
        let (name, _) = rules.first_match(b"Username: ").unwrap();
        assert_eq!(name, "login");
    }

    #[test]
    fn test_invalid_prompt_rejected() {
        assert!(LoginRules::new("(unclosed", None).is_err());
    }
}
