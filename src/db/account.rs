/// Account and family membership database models
use crate::error::{PantryError, PantryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

/// Per-account display preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub currency: String,
    pub low_stock_threshold: f64,
    pub notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency: "₹".to_string(),
            low_stock_threshold: 20.0,
            notifications: true,
        }
    }
}

impl Account {
    pub(crate) const COLUMNS: &'static str = "id, name, email, password_hash, is_verified, verification_code, \
         currency, low_stock_threshold, notifications, created_at";

    pub(crate) fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_verified: row.try_get("is_verified")?,
            verification_code: row.try_get("verification_code")?,
            preferences: Preferences {
                currency: row.try_get("currency")?,
                low_stock_threshold: row.try_get("low_stock_threshold")?,
                notifications: row.try_get("notifications")?,
            },
            created_at: row.try_get("created_at")?,
        })
    }

    /// Public view of the account: no password hash, no verification code
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            is_verified: self.is_verified,
            preferences: self.preferences.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account as returned to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

/// Family member role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> PantryResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            _ => Err(PantryError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Family member invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Active,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
        }
    }

    pub fn parse(s: &str) -> PantryResult<Self> {
        match s {
            "pending" => Ok(MemberStatus::Pending),
            "active" => Ok(MemberStatus::Active),
            _ => Err(PantryError::Internal(format!("Unknown member status: {}", s))),
        }
    }
}

/// Family member record.
///
/// Only the digest of the invite token is stored; the token itself exists
/// only in the invitation email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: String,
    #[serde(skip)]
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    #[serde(skip)]
    pub invite_token_hash: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
}

impl FamilyMember {
    pub(crate) const COLUMNS: &'static str =
        "id, account_id, name, email, role, status, invite_token_hash, added_at, activated_at";

    pub(crate) fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: MemberRole::parse(&role)?,
            status: MemberStatus::parse(&status)?,
            invite_token_hash: row.try_get("invite_token_hash")?,
            added_at: row.try_get("added_at")?,
            activated_at: row.try_get("activated_at")?,
        })
    }

    /// True while the member still holds a usable invite
    pub fn has_pending_invite(&self) -> bool {
        self.status == MemberStatus::Pending && self.invite_token_hash.is_some()
    }
}
