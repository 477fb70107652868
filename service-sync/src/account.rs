use crate::fiscal_code::OrganizationFiscalCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidateEmail;

/// User contract as returned by the gateway, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContract {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>
}

/// Who owns a subscription.
///
/// Organization accounts are recognised by carrying an organization fiscal
/// code in the note, or in place of the first name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Delegate,
    Organization
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAccount {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub note: String,
    pub kind: AccountKind
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountDecodeError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(String)
}

impl IdentityAccount {
    pub fn is_delegate(&self) -> bool {
        self.kind == AccountKind::Delegate
    }
}

fn classify(note: &str, first_name: &str) -> AccountKind {
    if OrganizationFiscalCode::is_valid(note.trim())
        || OrganizationFiscalCode::is_valid(first_name.trim())
    {
        AccountKind::Organization
    } else {
        AccountKind::Delegate
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, AccountDecodeError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(AccountDecodeError::MissingField(field))
}

impl TryFrom<UserContract> for IdentityAccount {
    type Error = AccountDecodeError;

    fn try_from(user: UserContract) -> Result<Self, Self::Error> {
        let id = required(user.id, "id")?;
        let first_name = required(user.first_name, "firstName")?;
        let last_name = required(user.last_name, "lastName")?;
        let email = required(user.email, "email")?;
        if !email.validate_email() {
            return Err(AccountDecodeError::InvalidEmail(email));
        }
        let note = user.note.unwrap_or_default();
        let kind = classify(&note, &first_name);

        Ok(Self {
            id,
            first_name,
            last_name,
            email,
            note,
            kind
        })
    }
}
