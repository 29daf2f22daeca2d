//! Signed upload URLs
//!
//! `PUT {public_url}/uploads/{key}?expires={unix}&signature={hex}` where the
//! signature is HMAC-SHA256 over `{key}\n{expires}` with the storage secret.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use clearance_config::MAX_UPLOAD_URL_TTL_SECS;

use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

const MAX_KEY_LENGTH: usize = 255;

/// Check an upload key: letters, digits, `.`, `_` and `-`, not starting with `.`
pub fn validate_key(key: &str) -> ApiResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(ApiError::validation(
            "key",
            format!("key must be between 1 and {} characters", MAX_KEY_LENGTH),
        ));
    }
    if key.starts_with('.')
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::validation(
            "key",
            "key can only contain letters, digits, '.', '_' and '-' and cannot start with '.'",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UploadSigner {
    secret: Vec<u8>,
    ttl: Duration,
    base_url: String,
}

impl UploadSigner {
    /// `ttl_secs` is capped at [`MAX_UPLOAD_URL_TTL_SECS`]
    pub fn new(secret: &str, ttl_secs: u64, base_url: &str) -> Self {
        let ttl_secs = ttl_secs.min(MAX_UPLOAD_URL_TTL_SECS);
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::seconds(ttl_secs as i64),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> ApiResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::Internal(format!("invalid signing key: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// URL allowing one `PUT` of `key` until the TTL runs out
    pub fn presigned_url(&self, key: &str, now: DateTime<Utc>) -> ApiResult<String> {
        let expires = (now + self.ttl).timestamp();
        let signature = hex::encode(self.mac(key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/uploads/{}?expires={}&signature={}",
            self.base_url,
            urlencoding::encode(key),
            expires,
            signature
        ))
    }

    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<()> {
        if now.timestamp() > expires {
            return Err(ApiError::Forbidden("Upload URL expired".to_string()));
        }
        let bad = || ApiError::Forbidden("Invalid upload signature".to_string());
        let signature = hex::decode(signature).map_err(|_| bad())?;
        self.mac(key, expires)?
            .verify_slice(&signature)
            .map_err(|_| bad())
    }
}

/// Location of an uploaded object
pub fn upload_path(upload_dir: &Path, key: &str) -> PathBuf {
    upload_dir.join(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UploadSigner {
        UploadSigner::new("secret", 60, "http://localhost:8080/")
    }

    fn parts(url: &str) -> (String, i64, String) {
        let (path, query) = url.split_once('?').unwrap();
        let key = path.rsplit('/').next().unwrap().to_string();
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => signature = v.to_string(),
                _ => {}
            }
        }
        (key, expires, signature)
    }

    #[test]
    fn test_presigned_url_verifies() {
        let now = Utc::now();
        let url = signer().presigned_url("pkg-1.tar.gz", now).unwrap();
        assert!(url.starts_with("http://localhost:8080/uploads/pkg-1.tar.gz?expires="));

        let (key, expires, signature) = parts(&url);
        assert!(signer().verify(&key, expires, &signature, now).is_ok());
    }

    #[test]
    fn test_tampering_is_rejected() {
        let now = Utc::now();
        let (key, expires, signature) = parts(&signer().presigned_url("a.tgz", now).unwrap());

        assert!(signer().verify("b.tgz", expires, &signature, now).is_err());
        assert!(signer().verify(&key, expires + 1, &signature, now).is_err());
        assert!(signer().verify(&key, expires, "zz", now).is_err());
        let other = UploadSigner::new("other", 60, "http://localhost:8080");
        assert!(other.verify(&key, expires, &signature, now).is_err());
    }

    #[test]
    fn test_expired_url_is_rejected() {
        let now = Utc::now();
        let (key, expires, signature) = parts(&signer().presigned_url("a.tgz", now).unwrap());
        let later = now + Duration::seconds(61);
        assert!(matches!(
            signer().verify(&key, expires, &signature, later),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let now = Utc::now();
        let signer = UploadSigner::new("secret", u64::MAX, "http://localhost:8080");
        let (key, expires, signature) = parts(&signer.presigned_url("a.tgz", now).unwrap());
        assert_eq!(expires, now.timestamp() + MAX_UPLOAD_URL_TTL_SECS as i64);
        assert!(signer.verify(&key, expires, &signature, now).is_ok());
    }

    #[test]
    fn test_key_rules() {
        assert!(validate_key("lodash-4.17.21_src.tar.gz").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(&"k".repeat(256)).is_err());
    }
}
