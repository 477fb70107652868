use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ORGANIZATION_FISCAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{11}$").expect("valid fiscal code pattern"));

/// Eleven-digit fiscal code identifying a public organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationFiscalCode(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an organization fiscal code: {0:?}")]
pub struct InvalidFiscalCode(pub String);

impl OrganizationFiscalCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(value: &str) -> bool {
        ORGANIZATION_FISCAL_CODE.is_match(value)
    }
}

impl FromStr for OrganizationFiscalCode {
    type Err = InvalidFiscalCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidFiscalCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for OrganizationFiscalCode {
    type Error = InvalidFiscalCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidFiscalCode(value))
        }
    }
}

impl From<OrganizationFiscalCode> for String {
    fn from(value: OrganizationFiscalCode) -> Self {
        value.0
    }
}

impl AsRef<str> for OrganizationFiscalCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationFiscalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_eleven_digits() {
        let code: OrganizationFiscalCode = "12345678901".parse().unwrap();
        assert_eq!(code.as_str(), "12345678901");
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!("1234567890".parse::<OrganizationFiscalCode>().is_err());
        assert!("123456789012".parse::<OrganizationFiscalCode>().is_err());
        assert!("ABCDEFGHIJK".parse::<OrganizationFiscalCode>().is_err());
        assert!(" 12345678901".parse::<OrganizationFiscalCode>().is_err());
        assert!("".parse::<OrganizationFiscalCode>().is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<OrganizationFiscalCode, _> = serde_json::from_str("\"00000000000\"");
        assert!(ok.is_ok());
        let bad: Result<OrganizationFiscalCode, _> = serde_json::from_str("\"not-a-code\"");
        assert!(bad.is_err());
    }
}
