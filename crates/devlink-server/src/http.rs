//! HTTP request handlers
//!
//! Includes the device-facing linking API, the activation pages and static
//! file serving.

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use devlink_auth::{AuthStatus, DisconnectStatus, IssuedCode, LinkError, RegistrySnapshot};
use devlink_web::Assets;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{debug, error};

use crate::state::AppState;

type ApiError = (StatusCode, String);

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Device API
        .route("/generate", get(generate_handler))
        .route("/authenticate", get(authenticate_handler))
        .route("/disconnect", get(disconnect_handler))
        // Activation
        .route("/token", get(token_handler).post(token_handler))
        .route("/", get(|| async { Redirect::to("/activate") }))
        .route("/activate", get(activate_handler))
        .route("/done", get(done_handler));

    if state.config.debug {
        router = router.route("/browse", get(browse_handler));
    }

    // Static files
    let router = match &state.config.public_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/*path", get(static_handler)),
    };

    router.with_state(state)
}

// ============================================================================
// Device API Handlers
// ============================================================================

/// Query parameters sent by devices
#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    /// The device id
    token: Option<String>,
}

impl DeviceQuery {
    fn device_id(&self, missing: &str) -> Result<&str, ApiError> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| bad_request(missing))
    }
}

fn bad_request(param: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        format!("Error 400: Syntax error, missing {} parameter\n", param),
    )
}

fn link_error(e: LinkError, param: &str) -> ApiError {
    match e {
        LinkError::MissingDeviceId => bad_request(param),
        e => {
            error!("Request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Issue an activation code for a device
///
/// The code stays valid for the configured TTL (15 minutes by default).
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<IssuedCode>, ApiError> {
    let device_id = query.device_id("token")?;
    state
        .linking
        .issue(device_id)
        .await
        .map(Json)
        .map_err(|e| link_error(e, "token"))
}

/// Report whether a device has been linked, and its token if so
async fn authenticate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<AuthStatus>, ApiError> {
    let device_id = query.device_id("id")?;
    state
        .linking
        .query(device_id)
        .await
        .map(Json)
        .map_err(|e| link_error(e, "id"))
}

/// Remove a device's link
async fn disconnect_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<DisconnectStatus>, ApiError> {
    let device_id = query.device_id("id")?;
    state
        .linking
        .revoke(device_id)
        .await
        .map(Json)
        .map_err(|e| link_error(e, "id"))
}

// ============================================================================
// Activation Handlers
// ============================================================================

/// Fields submitted by the activation form
#[derive(Debug, Default, Deserialize)]
pub struct RedeemForm {
    code: Option<String>,
    oauth: Option<String>,
}

/// Link the device behind a code to the submitted OAuth token
///
/// Reads the query string for GET and the form body for POST, then redirects
/// to the result page.
async fn token_handler(
    State(state): State<Arc<AppState>>,
    form: Option<Form<RedeemForm>>,
) -> Result<Redirect, ApiError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();

    match state
        .linking
        .redeem(form.code.as_deref(), form.oauth)
        .await
    {
        Ok(_) => Ok(Redirect::to("/done")),
        Err(e) => match e.error_code() {
            Some(code) => Ok(Redirect::to(&format!("/done?error={}", code))),
            None => Err(link_error(e, "code")),
        },
    }
}

/// Serve the activation form
async fn activate_handler() -> impl IntoResponse {
    match devlink_web::activate_page() {
        Some(page) => Html(page).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DoneQuery {
    error: Option<String>,
}

/// Show the outcome of an activation
async fn done_handler(Query(query): Query<DoneQuery>) -> Html<String> {
    Html(devlink_web::render_done(query.error.as_deref()))
}

/// Dump both registries (debug mode only)
async fn browse_handler(State(state): State<Arc<AppState>>) -> Json<RegistrySnapshot> {
    Json(state.linking.snapshot().await)
}

// ============================================================================
// Static Files
// ============================================================================

/// Serve embedded assets with proper content types
async fn static_handler(AxumPath(path): AxumPath<String>) -> Response {
    serve_asset(&path)
}

fn serve_asset(path: &str) -> Response {
    let path = path.trim_start_matches('/');

    debug!("Serving asset: {}", path);

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use devlink_auth::{CodeGenerator, CodeRegistry, LinkRegistry, LinkingManager};
    use devlink_core::Config;
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    async fn setup(config: Config) -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        let links = Arc::new(
            LinkRegistry::with_path(dir.path().join("links.json"))
                .await
                .unwrap(),
        );
        let codes = Arc::new(CodeRegistry::new(config.code_ttl_secs));
        let generator = CodeGenerator::new(config.code_range.clone());
        let linking = Arc::new(LinkingManager::new(generator, codes, links));
        let state = Arc::new(AppState::new(config, linking));
        (create_router(state), dir)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Response) {
        let resp = router.clone().oneshot(req).await.unwrap();
        (resp.status(), resp)
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let (status, resp) = send(router, req).await;
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post_token(router: &Router, body: &str) -> (StatusCode, String) {
        let req = Request::post("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, resp) = send(router, req).await;
        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (status, location)
    }

    #[tokio::test]
    async fn test_linking_scenario() {
        let (router, _dir) = setup(Config::default()).await;

        let (status, issued) = get_json(&router, "/generate?token=dev1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(issued["expiration"], 900);
        let code = issued["code"].as_str().unwrap().to_string();
        assert_eq!(code.len(), 5);

        let (status, location) =
            post_token(&router, &format!("code={}&oauth=tok-abc", code)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location, "/done");

        let (_, auth) = get_json(&router, "/authenticate?token=dev1").await;
        assert_eq!(auth["linked"], "yes");
        assert_eq!(auth["oauth_token"], "tok-abc");

        let (_, disconnect) = get_json(&router, "/disconnect?token=dev1").await;
        assert_eq!(disconnect["success"], "yes");

        let (_, auth) = get_json(&router, "/authenticate?token=dev1").await;
        assert_eq!(auth["linked"], "no");
        assert_eq!(auth["oauth_token"], "");
    }

    #[tokio::test]
    async fn test_token_via_query_string() {
        let (router, _dir) = setup(Config::default()).await;
        let (_, issued) = get_json(&router, "/generate?token=tv").await;
        let code = issued["code"].as_str().unwrap();

        let req = Request::get(format!("/token?code={}&oauth=tok", code))
            .body(Body::empty())
            .unwrap();
        let (status, resp) = send(&router, req).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/done");
    }

    #[tokio::test]
    async fn test_token_error_redirects() {
        let (router, _dir) = setup(Config::default()).await;

        let (_, location) = post_token(&router, "oauth=tok").await;
        assert_eq!(location, "/done?error=1");

        let (_, location) = post_token(&router, "code=48215&oauth=tok").await;
        assert_eq!(location, "/done?error=2");

        let req = Request::post("/token").body(Body::empty()).unwrap();
        let (status, resp) = send(&router, req).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/done?error=1");
    }

    #[tokio::test]
    async fn test_link_write_failure() {
        let (router, dir) = setup(Config::default()).await;
        let (_, issued) = get_json(&router, "/generate?token=dev1").await;
        let code = issued["code"].as_str().unwrap().to_string();

        // Link the device, then make the link file unwritable
        let (_, location) = post_token(&router, &format!("code={}&oauth=tok", code)).await;
        assert_eq!(location, "/done");
        let path = dir.path().join("links.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        // The user lands on the error page rather than a bare error
        let (status, location) =
            post_token(&router, &format!("code={}&oauth=tok-2", code)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location, "/done?error=3");

        // Devices get a server error
        let req = Request::get("/disconnect?token=dev1")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, auth) = get_json(&router, "/authenticate?token=dev1").await;
        assert_eq!(auth["oauth_token"], "tok");
    }

    #[tokio::test]
    async fn test_missing_device_id() {
        let (router, _dir) = setup(Config::default()).await;

        for uri in ["/generate", "/authenticate", "/disconnect", "/generate?token="] {
            let req = Request::get(uri).body(Body::empty()).unwrap();
            let (status, resp) = send(&router, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
            assert!(String::from_utf8_lossy(&bytes).starts_with("Error 400"));
        }
    }

    #[tokio::test]
    async fn test_disconnect_unlinked_device() {
        let (router, _dir) = setup(Config::default()).await;
        let (status, body) = get_json(&router, "/disconnect?token=nobody").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], "no");
    }

    #[tokio::test]
    async fn test_done_page_messages() {
        let (router, _dir) = setup(Config::default()).await;

        let req = Request::get("/done?error=2").body(Body::empty()).unwrap();
        let (status, resp) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Invalid or expired code!"));
    }

    #[tokio::test]
    async fn test_browse_requires_debug() {
        let (router, _dir) = setup(Config::default()).await;
        let req = Request::get("/browse").body(Body::empty()).unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (router, _dir) = setup(Config::new().with_debug(true)).await;
        get_json(&router, "/generate?token=dev1").await;
        let (status, body) = get_json(&router, "/browse").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["codes"].as_array().unwrap().len(), 1);
        assert_eq!(body["tokens"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_static_assets() {
        let (router, _dir) = setup(Config::default()).await;

        let req = Request::get("/style.css").body(Body::empty()).unwrap();
        let (status, resp) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/css");

        let req = Request::get("/activate").body(Body::empty()).unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::get("/nope.png").body(Body::empty()).unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
