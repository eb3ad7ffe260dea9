use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdmin {
    pub username: String,
}

impl CreateAdmin {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        let valid = (3..=50).contains(&username.len())
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AppError::BadRequest(msg::USERNAME_INVALID.into()));
        }
        Ok(())
    }
}

/// Returned once, at creation. The plaintext key is never stored.
#[derive(Debug, Serialize)]
pub struct AdminWithKey {
    #[serde(flatten)]
    pub admin: Admin,
    pub api_key: String,
}
