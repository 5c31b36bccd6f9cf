#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora::api::{self, AppState};
use agora::config::Config;
use agora::services::ResetNotifier;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const PASSWORD: &str = "Str0ng!Pass";

/// Captures reset deliveries instead of sending them anywhere.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    /// A notifier that takes `delay` to accept each delivery, like a slow relay.
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Delivery runs in the background, so poll for it.
    pub async fn wait_for_token(&self, recipient: &str) -> Option<String> {
        for _ in 0..100 {
            if let Some(token) = self.last_token_for(recipient) {
                return Some(token);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }

    pub fn last_token_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == recipient)
            .map(|(_, token)| token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn deliver(&self, recipient: &str, token: &str) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), token.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config() -> (Config, PathBuf) {
    let db_path = std::env::temp_dir().join(format!("agora-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.server.secure_cookies = false;
    config.maintenance.enabled = false;

    (config, db_path)
}

pub async fn spawn_app() -> TestApp {
    let (config, _) = test_config();
    spawn_app_with(config).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    spawn_app_with_notifier(config, RecordingNotifier::default()).await
}

pub async fn spawn_app_with_notifier(config: Config, notifier: RecordingNotifier) -> TestApp {
    let db_path = PathBuf::from(
        config
            .general
            .database_path
            .trim_start_matches("sqlite:")
            .to_string(),
    );
    let notifier = Arc::new(notifier);

    let state = api::create_app_state_with_notifier(config, notifier.clone(), None)
        .await
        .expect("Failed to create app state");
    let router = api::router(state.clone()).await;

    TestApp {
        router,
        state,
        notifier,
        db_path,
    }
}

impl TestApp {
    /// Serves the router on an ephemeral local port, for clients that need
    /// a real connection such as websockets.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        addr
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap()
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Response<Body> {
        self.post_form(
            "/register",
            None,
            &[
                ("username", username),
                ("email", email),
                ("password", password),
                ("display_name", display_name),
            ],
        )
        .await
    }

    /// Registers `username` with [`PASSWORD`] and a display name derived from it.
    pub async fn register_user(&self, username: &str) {
        let response = self
            .register(
                username,
                &format!("{username}@example.com"),
                PASSWORD,
                &format!("{username} display"),
            )
            .await;
        assert_eq!(location(&response).as_deref(), Some("/login?registered=1"));
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        self.post_form(
            "/login",
            None,
            &[("username", username), ("password", password)],
        )
        .await
    }

    /// Logs in and returns the session cookie.
    pub async fn login_cookie(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(location(&response).as_deref(), Some("/"));
        session_cookie(&response).expect("login should set a session cookie")
    }
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
