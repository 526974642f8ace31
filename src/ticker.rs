use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A listed KRX instrument code: exactly six ASCII digits (`005930`).
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True when `term` looks like a ticker code rather than a name.
pub fn is_ticker_code(term: &str) -> bool {
    term.len() == 6 && term.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<&str> for Ticker {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if is_ticker_code(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(format!("Could not convert {} to ticker", value))
        }
    }
}

impl TryFrom<&String> for Ticker {
    type Error = String;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
