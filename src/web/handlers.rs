//! Web 路由处理函数
//!
//! 实现 REST API 和仪表板页面的处理逻辑

use super::auth::{removal_cookie, AuthGate};
use super::error::ApiError;
use super::WebAppState;
use crate::monitor::{Monitor, MonitorStatus, Settings, Stats};
use askama::Template;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// 批量添加请求
#[derive(Debug, Deserialize)]
pub struct CreateMonitorsRequest {
    /// 以换行分隔的URL
    #[serde(default)]
    pub urls: Option<String>,
    /// 单独的检测间隔（秒）
    #[serde(default)]
    pub interval: Option<i64>,
}

/// 修改监控项请求
#[derive(Debug, Deserialize)]
pub struct UpdateMonitorRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// 修改全局设置请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub global_interval: Option<i64>,
}

/// 登录请求（JSON 或表单）
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// 将请求中的间隔转换为合法的秒数
fn parse_interval(value: i64) -> Result<u64, ApiError> {
    u64::try_from(value)
        .map_err(|_| ApiError::BadRequest(invalid_interval_message()))
        .and_then(|secs| {
            Settings::validate_interval(secs).map_err(ApiError::BadRequest)?;
            Ok(secs)
        })
}

fn invalid_interval_message() -> String {
    match Settings::validate_interval(0) {
        Err(msg) => msg,
        Ok(()) => "Invalid interval".to_string(),
    }
}

/// GET /api/monitors
pub async fn list_monitors(
    State(state): State<WebAppState>,
) -> Result<Json<Vec<Monitor>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

/// POST /api/monitors
pub async fn create_monitors(
    State(state): State<WebAppState>,
    payload: Result<Json<CreateMonitorsRequest>, JsonRejection>,
) -> Result<Json<Vec<Monitor>>, ApiError> {
    let Json(request) = payload?;
    let urls = request
        .urls
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("URLs required".to_string()))?;
    let interval = request.interval.map(parse_interval).transpose()?;

    let created = state.service.add_bulk(&urls, interval).await?;
    Ok(Json(created))
}

/// PATCH /api/monitors/{id}
pub async fn update_monitor(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateMonitorRequest>, JsonRejection>,
) -> Result<Json<Monitor>, ApiError> {
    let Json(request) = payload?;
    let monitor = state
        .service
        .update_url(&id, request.url.as_deref())
        .await?;
    Ok(Json(monitor))
}

/// PATCH /api/monitors/{id}/toggle
pub async fn toggle_monitor(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<Json<Monitor>, ApiError> {
    Ok(Json(state.service.toggle(&id).await?))
}

/// DELETE /api/monitors/{id}
pub async fn delete_monitor(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.service.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/monitors/{id}/check
pub async fn check_monitor(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<Json<Monitor>, ApiError> {
    Ok(Json(state.service.check_now(&id).await?))
}

/// POST /api/monitors/check-all
pub async fn check_all_monitors(
    State(state): State<WebAppState>,
) -> Result<Json<Value>, ApiError> {
    let report = state.service.check_all().await?;
    info!("手动检测完成: {}/{}", report.checked, report.total);
    Ok(Json(json!({
        "success": true,
        "message": format!("Checked {} monitor(s)", report.checked),
        "checked": report.checked,
        "total": report.total,
    })))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<WebAppState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.service.settings().await?))
}

/// PATCH /api/settings
pub async fn update_settings(
    State(state): State<WebAppState>,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let interval = request
        .global_interval
        .ok_or_else(|| ApiError::BadRequest(invalid_interval_message()))
        .and_then(parse_interval)?;

    let settings = state.service.update_settings(interval).await?;
    Ok(Json(json!({
        "success": true,
        "globalInterval": settings.global_interval,
    })))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<WebAppState>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.service.stats().await?))
}

/// GET /api/health
pub async fn health(State(state): State<WebAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/scheduler
pub async fn scheduler_status(State(state): State<WebAppState>) -> impl IntoResponse {
    Json(state.service.scheduler().status())
}

/// POST /api/login
pub async fn api_login(
    State(state): State<WebAppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let Json(request) = payload?;
    match state.auth.as_ref() {
        None => Ok((jar, Json(json!({ "success": true })))),
        Some(gate) if gate.verify_password(&request.password) => {
            info!("登录成功");
            Ok((jar.add(gate.session_cookie()), Json(json!({ "success": true }))))
        }
        Some(_) => {
            warn!("登录失败：密码错误");
            Err(ApiError::Unauthorized)
        }
    }
}

/// POST /api/logout
pub async fn api_logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (jar.remove(removal_cookie()), Json(json!({ "success": true })))
}

/// 仪表板中的一行
struct MonitorRow {
    name: String,
    url: String,
    status: &'static str,
    status_class: &'static str,
    status_code: String,
    latency: String,
    last_checked: String,
    interval: String,
}

impl MonitorRow {
    fn from_monitor(monitor: &Monitor, global_interval: u64) -> Self {
        let status_class = match monitor.status {
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
            MonitorStatus::Pending => "pending",
            MonitorStatus::Paused => "paused",
        };
        Self {
            name: monitor.name.clone(),
            url: monitor.url.clone(),
            status: monitor.status.as_str(),
            status_class,
            status_code: match monitor.status_code {
                Some(0) | None => "-".to_string(),
                Some(code) => code.to_string(),
            },
            latency: monitor
                .latency
                .map(|ms| format!("{ms} ms"))
                .unwrap_or_else(|| "-".to_string()),
            last_checked: monitor
                .last_checked
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
            interval: match monitor.interval {
                Some(secs) => format!("{secs}s"),
                None => format!("{global_interval}s (global)"),
            },
        }
    }
}

/// 仪表板模板
#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    monitors: Vec<MonitorRow>,
    stats: Stats,
    global_interval: u64,
    last_updated: String,
    refresh_interval: u32,
    auth_enabled: bool,
}

/// 登录页模板
#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
}

fn render_html<T: Template>(template: &T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("模板渲染失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "模板渲染失败").into_response()
        }
    }
}

fn is_authorized(gate: Option<&AuthGate>, headers: &HeaderMap, jar: &CookieJar) -> bool {
    match gate {
        Some(gate) => gate.is_authorized(headers, jar),
        None => true,
    }
}

/// GET / 仪表板页面，未登录时显示登录表单
pub async fn dashboard(
    State(state): State<WebAppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if !is_authorized(state.auth.as_ref(), &headers, &jar) {
        return render_html(&LoginTemplate { error: None }, StatusCode::OK);
    }

    let (monitors, global_interval) =
        match (state.service.list().await, state.service.settings().await) {
            (Ok(monitors), Ok(settings)) => (monitors, settings.global_interval),
            (Err(e), _) | (_, Err(e)) => return ApiError::from(e).into_response(),
        };

    let template = DashboardTemplate {
        stats: Stats::from_monitors(&monitors),
        monitors: monitors
            .iter()
            .map(|m| MonitorRow::from_monitor(m, global_interval))
            .collect(),
        global_interval,
        last_updated: chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string(),
        refresh_interval: state.config.refresh_interval_seconds,
        auth_enabled: state.auth.is_some(),
    };

    render_html(&template, StatusCode::OK)
}

/// POST /login 表单登录
pub async fn form_login(
    State(state): State<WebAppState>,
    jar: CookieJar,
    payload: Result<Form<LoginRequest>, FormRejection>,
) -> Response {
    let password = payload.map(|Form(req)| req.password).unwrap_or_default();
    match state.auth.as_ref() {
        None => Redirect::to("/").into_response(),
        Some(gate) if gate.verify_password(&password) => {
            info!("表单登录成功");
            (jar.add(gate.session_cookie()), Redirect::to("/")).into_response()
        }
        Some(_) => {
            warn!("表单登录失败：密码错误");
            render_html(
                &LoginTemplate {
                    error: Some("Invalid password".to_string()),
                },
                StatusCode::UNAUTHORIZED,
            )
        }
    }
}

/// POST /logout 表单注销
pub async fn form_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(removal_cookie()), Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchedulerConfig, ServerConfig};
    use crate::health::{CheckResult, CheckScheduler, HealthChecker, ManualClock};
    use crate::monitor::MonitorService;
    use crate::notification::NotificationDispatcher;
    use crate::storage::{MemoryStore, MonitorStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct AlwaysDown;

    #[async_trait]
    impl HealthChecker for AlwaysDown {
        async fn check(&self, _url: &str) -> CheckResult {
            CheckResult::network_failure("DNS resolution failed".to_string(), 0)
        }

        async fn check_with_timeout(&self, url: &str, _timeout: Duration) -> CheckResult {
            self.check(url).await
        }
    }

    fn app_state(password: Option<&str>) -> WebAppState {
        let store: Arc<dyn MonitorStore> = Arc::new(MemoryStore::new());
        let scheduler = CheckScheduler::new(
            store.clone(),
            Arc::new(AlwaysDown),
            Arc::new(NotificationDispatcher::new(Vec::new()).unwrap()),
            SchedulerConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::new(5_000)));
        WebAppState::new(
            MonitorService::new(store, Arc::new(scheduler)),
            ServerConfig::default(),
            AuthGate::from_password(password),
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(10).unwrap(), 10);
        assert!(parse_interval(9).is_err());
        assert!(parse_interval(-5).is_err());
        assert!(parse_interval(i64::MAX).is_err());
        assert!(parse_interval(crate::monitor::MAX_INTERVAL_SECONDS as i64).is_ok());
        assert_eq!(
            invalid_interval_message(),
            "Invalid interval (must be >= 10 seconds)"
        );
    }

    #[tokio::test]
    async fn test_create_requires_urls() {
        let state = app_state(None);
        let request = CreateMonitorsRequest {
            urls: Some("   ".to_string()),
            interval: None,
        };
        let err = create_monitors(State(state), Ok(Json(request)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "URLs required");
    }

    #[tokio::test]
    async fn test_check_monitor_records_down() {
        let state = app_state(None);
        let created = state
            .service
            .add_bulk("bad.invalid", None)
            .await
            .unwrap();

        let Json(monitor) = check_monitor(State(state.clone()), Path(created[0].id.clone()))
            .await
            .unwrap();
        assert_eq!(monitor.status, MonitorStatus::Down);
        assert_eq!(monitor.status_code, Some(0));
        assert_eq!(monitor.history.len(), 1);
    }

    #[tokio::test]
    async fn test_dashboard_handler() {
        let state = app_state(None);
        state
            .service
            .add_bulk("example.com", Some(60))
            .await
            .unwrap();

        let response = dashboard(State(state), HeaderMap::new(), CookieJar::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("example.com"));
        assert!(html.contains("PENDING"));
    }

    #[tokio::test]
    async fn test_dashboard_shows_login_when_locked() {
        let state = app_state(Some("secret"));
        let response = dashboard(State(state), HeaderMap::new(), CookieJar::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("name=\"password\""));
    }

    #[tokio::test]
    async fn test_form_login_wrong_password() {
        let state = app_state(Some("secret"));
        let response = form_login(
            State(state),
            CookieJar::new(),
            Ok(Form(LoginRequest {
                password: "nope".to_string(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Invalid password"));
    }

    #[tokio::test]
    async fn test_form_login_sets_cookie_and_redirects() {
        let state = app_state(Some("secret"));
        let response = form_login(
            State(state),
            CookieJar::new(),
            Ok(Form(LoginRequest {
                password: "secret".to_string(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response
            .headers()
            .get(axum::http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("sentinel_session="));
    }
}
