use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use movies_types::claim::TimeLimited;
use serde::de::DeserializeOwned;

use crate::error::Result;

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

/// Issues and validates HS256 signed API tokens
pub struct TokenManager {
    keys: Keys,
    default_validity: std::time::Duration,
    header: Header,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, default_validity: std::time::Duration) -> Self {
        let validation = Validation::default();
        let header = Header::default();
        Self {
            keys: Keys::new(secret),
            default_validity,
            header,
            validation,
        }
    }

    pub fn issue(&self, claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        self.issue_valid_for(claims, self.default_validity)
    }

    pub fn issue_valid_for(
        &self,
        mut claims: impl serde::Serialize + TimeLimited,
        validity: std::time::Duration,
    ) -> Result<String> {
        let until = std::time::SystemTime::now() + validity;
        claims.set_validity(until);
        let token = encode(&self.header, &claims, &self.keys.encoding)?;
        Ok(token)
    }

    #[cfg(test)]
    pub fn issue_expired(&self, mut claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        let now = std::time::SystemTime::now();
        let validity = now - self.default_validity;
        claims.set_validity(validity);
        let token = encode(&self.header, &claims, &self.keys.encoding)?;
        Ok(token)
    }

    pub fn validate<T>(&self, token: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let data = decode::<T>(token, &self.keys.decoding, &self.validation)?;
        Ok(data.claims)
    }

    pub fn default_validity(&self) -> std::time::Duration {
        self.default_validity
    }
}
