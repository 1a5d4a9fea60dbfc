//! Optional rewriting of chatterbot replies before they are sent.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// One or more periods ending a sentence (followed by whitespace or end of text).
static TERMINAL_PERIODS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+(\s|$)").unwrap());

/// How replies are rewritten before sending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyNormalization {
    /// Send the reply exactly as the chatterbot produced it.
    #[default]
    None,
    /// Drop sentence-ending periods and lowercase, for a casual texting tone.
    StripPeriodsLowercase,
}

impl ReplyNormalization {
    pub fn apply(self, reply: &str) -> String {
        match self {
            ReplyNormalization::None => reply.to_string(),
            ReplyNormalization::StripPeriodsLowercase => TERMINAL_PERIODS
                .replace_all(reply, "${1}")
                .to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        assert_eq!(ReplyNormalization::None.apply("Hello. Bye."), "Hello. Bye.");
    }

    #[test]
    fn test_strip_periods_lowercase() {
        let n = ReplyNormalization::StripPeriodsLowercase;
        assert_eq!(n.apply("Hello there. How are you."), "hello there how are you");
        assert_eq!(n.apply("Well... maybe."), "well maybe");
    }

    #[test]
    fn test_keeps_inner_periods() {
        let n = ReplyNormalization::StripPeriodsLowercase;
        assert_eq!(n.apply("Pi is 3.14."), "pi is 3.14");
        assert_eq!(n.apply("See example.com!"), "see example.com!");
    }

    #[test]
    fn test_preserves_whitespace_after_period() {
        let n = ReplyNormalization::StripPeriodsLowercase;
        assert_eq!(n.apply("One.\nTwo."), "one\ntwo");
    }

    #[test]
    fn test_config_names() {
        let n: ReplyNormalization = serde_json::from_str(r#""strip_periods_lowercase""#).unwrap();
        assert_eq!(n, ReplyNormalization::StripPeriodsLowercase);
        let n: ReplyNormalization = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(n, ReplyNormalization::None);
    }
}
