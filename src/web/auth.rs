//! 共享密码认证
//!
//! 配置了 `auth.password` 时，除公开路由外的 API 需要会话 Cookie 或 `X-API-Key` 头。
//! 会话 Cookie 的值为 `base64(HMAC-SHA256(password, SESSION_LABEL))`，
//! 服务端无需保存会话状态。

use super::error::ApiError;
use super::WebAppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// 会话 Cookie 名称
pub const SESSION_COOKIE: &str = "sentinel_session";

/// API Key 请求头
pub const API_KEY_HEADER: &str = "x-api-key";

const SESSION_LABEL: &[u8] = b"uptime-sentinel-session";

/// 共享密码校验器
#[derive(Clone)]
pub struct AuthGate {
    password: String,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

impl AuthGate {
    /// 根据配置的密码创建校验器，密码为空时不启用认证
    pub fn from_password(password: Option<&str>) -> Option<Self> {
        password
            .filter(|p| !p.is_empty())
            .map(|p| Self {
                password: p.to_string(),
            })
    }

    fn mac_for(key: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
        mac.update(SESSION_LABEL);
        Some(mac)
    }

    /// 会话令牌
    pub fn session_token(&self) -> String {
        Self::mac_for(&self.password)
            .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// 校验会话令牌（常量时间比较）
    pub fn verify_token(&self, token: &str) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(token) else {
            return false;
        };
        Self::mac_for(&self.password).is_some_and(|mac| mac.verify_slice(&tag).is_ok())
    }

    /// 校验明文密码
    pub fn verify_password(&self, candidate: &str) -> bool {
        Self::mac_for(candidate)
            .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
            .is_some_and(|token| self.verify_token(&token))
    }

    /// 判断请求是否携带有效凭据
    pub fn is_authorized(&self, headers: &HeaderMap, jar: &CookieJar) -> bool {
        let by_key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|key| self.verify_password(key));
        by_key
            || jar
                .get(SESSION_COOKIE)
                .is_some_and(|cookie| self.verify_token(cookie.value()))
    }

    /// 登录成功后下发的 Cookie
    pub fn session_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, self.session_token()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// 注销时用于清除 Cookie
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// 认证中间件
///
/// 未配置密码时直接放行。
pub async fn require_auth(
    State(state): State<WebAppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(gate) = state.auth.as_ref() else {
        return Ok(next.run(req).await);
    };

    if gate.is_authorized(req.headers(), &jar) {
        debug!(path = %req.uri().path(), "认证通过");
        Ok(next.run(req).await)
    } else {
        warn!(path = %req.uri().path(), "拒绝未认证的请求");
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_gate_disabled_without_password() {
        assert!(AuthGate::from_password(None).is_none());
        assert!(AuthGate::from_password(Some("")).is_none());
        assert!(AuthGate::from_password(Some("secret")).is_some());
    }

    #[test]
    fn test_token_roundtrip_and_tamper() {
        let gate = AuthGate::from_password(Some("secret")).unwrap();
        let token = gate.session_token();
        assert!(!token.is_empty());
        assert!(gate.verify_token(&token));

        let other = AuthGate::from_password(Some("other")).unwrap();
        assert!(!gate.verify_token(&other.session_token()));
        assert!(!gate.verify_token("not base64 !!"));
    }

    #[test]
    fn test_verify_password() {
        let gate = AuthGate::from_password(Some("secret")).unwrap();
        assert!(gate.verify_password("secret"));
        assert!(!gate.verify_password("Secret"));
        assert!(!gate.verify_password(""));
    }

    #[test]
    fn test_is_authorized_by_header_or_cookie() {
        let gate = AuthGate::from_password(Some("secret")).unwrap();

        let mut headers = HeaderMap::new();
        assert!(!gate.is_authorized(&headers, &CookieJar::new()));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(gate.is_authorized(&headers, &CookieJar::new()));

        let jar = CookieJar::new().add(gate.session_cookie());
        assert!(gate.is_authorized(&HeaderMap::new(), &jar));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let gate = AuthGate::from_password(Some("secret")).unwrap();
        let cookie = gate.session_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
