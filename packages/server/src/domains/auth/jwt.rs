use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // Subject (moodle ID as string)
    pub moodle_id: i64,     // Student moodle ID
    pub username: String,   // Username (for logging)
    pub year: String,       // Year tag (FE/SE/TE/BE)
    pub branch: String,     // Department branch
    pub is_staff: bool,     // Staff flag (can mark attendance)
    pub is_superuser: bool, // Admin flag (leaderboard mutation)
    pub exp: i64,           // Expiration timestamp
    pub iat: i64,           // Issued at timestamp
    pub iss: String,        // Issuer
}

/// JWT Service - creates and verifies JWT tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    /// Create new JWT service with secret and issuer
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Create a new JWT token for a student
    ///
    /// Token expires after 24 hours
    pub fn create_token(
        &self,
        moodle_id: i64,
        username: &str,
        year: &str,
        branch: &str,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(24);

        let claims = Claims {
            sub: moodle_id.to_string(),
            moodle_id,
            username: username.to_string(),
            year: year.to_string(),
            branch: branch.to_string(),
            is_staff,
            is_superuser,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a JWT token
    ///
    /// Returns claims if token is valid and not expired
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_token() {
        let service = JwtService::new("test_secret_key", "test_issuer".to_string());

        let token = service
            .create_token(22103042, "alice", "TE", "COMPS", false, false)
            .unwrap();

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.moodle_id, 22103042);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.branch, "COMPS");
        assert!(!claims.is_staff);
        assert_eq!(claims.iss, "test_issuer");
    }

    #[test]
    fn test_invalid_token() {
        let service = JwtService::new("test_secret_key", "test_issuer".to_string());
        let result = service.verify_token("invalid_token");
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let service1 = JwtService::new("secret1", "test_issuer".to_string());
        let service2 = JwtService::new("secret2", "test_issuer".to_string());

        let token = service1
            .create_token(1, "bob", "FE", "IT", false, false)
            .unwrap();

        // Token created with secret1 should not verify with secret2
        let result = service2.verify_token(&token);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let service1 = JwtService::new("shared_secret", "issuer_a".to_string());
        let service2 = JwtService::new("shared_secret", "issuer_b".to_string());

        let token = service1
            .create_token(1, "bob", "FE", "IT", false, false)
            .unwrap();

        assert!(service2.verify_token(&token).is_err());
    }
}
