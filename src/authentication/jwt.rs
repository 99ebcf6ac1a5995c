use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::{Error, ErrorKind};
use crate::schema::{Id, User, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, lifetime_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self {
            user_id: id,
            iat,
            exp,
        }
    }
}

/// Authenticated caller, rebuilt from storage on every request.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(ErrorKind::Forbidden.default());
        }
        Ok(())
    }

    /// Authors manage their own objects; admins manage everyone's.
    pub fn authenticate_owner(
        &self,
        owner_id: Id,
        own: ActionType,
        any: ActionType,
    ) -> Result<(), Error> {
        if owner_id == self.user_id {
            self.authenticate(own)
        } else {
            self.authenticate(any)
        }
    }
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        SessionData {
            user_id: user.id,
            role: user.role,
            is_admin: user.is_admin(),
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| ErrorKind::Internal.new("Invalid signing key"))
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, lifetime_hours);

    claims
        .sign_with_key(&key)
        .map_err(|e| ErrorKind::Internal.new(&format!("Failed to sign token: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ErrorKind::Unauthorized.new("Invalid token."))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(ErrorKind::Unauthorized.new("Token expired."));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::new(),
            role,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn signed_token_verifies() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", 1).unwrap();
        let session = verify_jwt_session(&token, "secret").unwrap();

        assert_eq!(session.user_id, 7);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", 1).unwrap();
        let err = verify_jwt_session(&token, "other").unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn expired_token_is_rejected() {
        let key = signing_key("secret").unwrap();
        let claims = JwtSessionData {
            user_id: 7,
            iat: 0,
            exp: 1,
        };
        let token = claims.sign_with_key(&key).unwrap();

        let err = verify_jwt_session(&token, "secret").unwrap_err();
        assert_eq!(err.info, "Token expired.");
    }

    #[test]
    fn session_carries_admin_flag() {
        let mut staff = user(UserRole::User);
        staff.is_staff = true;

        assert!(SessionData::from(&staff).is_admin);
        assert!(SessionData::from(&user(UserRole::Admin)).is_admin);
        assert!(!SessionData::from(&user(UserRole::User)).is_admin);
    }
}
