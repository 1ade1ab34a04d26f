//! State tokens.
//!
//! Server-side tokens have the form `{logical}:{actual}`. The logical part
//! stays the same for every postback of one view instance; the actual part is
//! new for every save, so each saved state is addressed by its own token.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStrategy {
    /// 128 random bits, hex encoded
    Random,
    /// Per-session counter
    Sequential,
}

impl TokenStrategy {
    pub fn from_unique_flag(unique: bool) -> Self {
        if unique {
            TokenStrategy::Random
        } else {
            TokenStrategy::Sequential
        }
    }

    /// `sequence` is the next value of the session's counter
    pub fn generate(self, sequence: u64) -> String {
        match self {
            TokenStrategy::Random => {
                let mut rng = rand::rng();
                format!("{:016x}{:016x}", rng.random::<u64>(), rng.random::<u64>())
            }
            TokenStrategy::Sequential => sequence.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToken {
    pub logical: String,
    pub actual: String,
}

impl ServerToken {
    pub fn new(logical: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            logical: logical.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for ServerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.logical, self.actual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedToken(pub String);

impl FromStr for ServerToken {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((logical, actual))
                if !logical.is_empty() && !actual.is_empty() && !actual.contains(':') =>
            {
                Ok(ServerToken::new(logical, actual))
            }
            _ => Err(MalformedToken(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_differ() {
        let a = TokenStrategy::Random.generate(0);
        let b = TokenStrategy::Random.generate(0);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_tokens() {
        assert_eq!(TokenStrategy::Sequential.generate(4), "4");
    }

    #[test]
    fn test_parse_server_token() {
        let token: ServerToken = "12:ab".parse().unwrap();
        assert_eq!(token, ServerToken::new("12", "ab"));
        assert_eq!(token.to_string(), "12:ab");

        assert!("nocolon".parse::<ServerToken>().is_err());
        assert!(":x".parse::<ServerToken>().is_err());
        assert!("a:b:c".parse::<ServerToken>().is_err());
    }
}
