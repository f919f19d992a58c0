//! 업스트림 요청 인증.
//!
//! 시장 데이터 클라이언트는 인증 방식을 상속하지 않고
//! [`RequestAuthenticator`] 능력 하나만 받아 요청에 적용합니다.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// API 키 헤더 이름.
pub const API_KEY_HEADER: &str = "APCA-API-KEY-ID";
/// API 시크릿 헤더 이름.
pub const API_SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// 요청에 인증 정보를 붙이는 능력.
pub trait RequestAuthenticator: Send + Sync {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder;
}

/// 키/시크릿 헤더 인증.
///
/// `Debug` 구현은 키 일부만 보여 주고 시크릿은 숨깁니다.
#[derive(Clone)]
pub struct ApiKeyAuth {
    key_id: String,
    secret_key: SecretString,
}

impl ApiKeyAuth {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl RequestAuthenticator for ApiKeyAuth {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(API_KEY_HEADER, &self.key_id)
            .header(API_SECRET_HEADER, self.secret_key.expose_secret())
    }
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars: Vec<char> = self.key_id.chars().collect();
        let masked_key = if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("ApiKeyAuth")
            .field("key_id", &masked_key)
            .field("secret_key", &"***REDACTED***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let auth = ApiKeyAuth::new("PKABCDEFGHIJ1234", "super-secret-value");
        let debug = format!("{:?}", auth);

        assert!(debug.contains("PKAB...1234"));
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("PKABCDEFGHIJ1234"));
    }

    #[test]
    fn test_debug_masks_multibyte_key() {
        let auth = ApiKeyAuth::new("키가나다라마바사아자차", "secret");
        let debug = format!("{:?}", auth);

        assert!(debug.contains("키가나다...사아자차"));
        assert!(!debug.contains("마바"));
    }

    #[test]
    fn test_authenticate_sets_headers() {
        let auth = ApiKeyAuth::new("key", "secret");
        let request = auth
            .authenticate(reqwest::Client::new().get("http://localhost/"))
            .build()
            .unwrap();

        assert_eq!(request.headers()[API_KEY_HEADER], "key");
        assert_eq!(request.headers()[API_SECRET_HEADER], "secret");
    }
}
