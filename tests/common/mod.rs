#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};
use todo_auth::auth::{AuthError, ResetNotifier, TokenPair};
use todo_auth::config::Config;
use todo_auth::routes::{self, health};
use todo_auth::services::AppServices;
use todo_auth::store::{InMemoryCredentialStore, InMemoryRefreshTokenStore};

pub const ADMIN_USERNAME: &str = "admin@mail.com";
pub const ADMIN_PASSWORD: &str = "admin";

/// Captures reset tokens instead of mailing them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn notify(&self, email: &str, token: &str) -> Result<(), AuthError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}

pub struct TestContext {
    pub services: AppServices,
    pub notifier: Arc<RecordingNotifier>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenStore>,
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/unused"),
        ("JWT_SECRET", "integration-test-secret-0123456789abcdef"),
        ("BCRYPT_COST", "4"),
        ("STORE_TIMEOUT_MS", "1000"),
        ("ADMIN_USERNAME", ADMIN_USERNAME),
        ("ADMIN_PASSWORD", ADMIN_PASSWORD),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test configuration is valid")
}

/// Services over in-memory stores, with the administrator already seeded.
pub async fn test_context() -> TestContext {
    let config = test_config();
    let notifier = Arc::new(RecordingNotifier::default());
    let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());

    let services = AppServices::build(
        &config,
        Arc::new(InMemoryCredentialStore::new()),
        refresh_tokens.clone(),
        notifier.clone(),
    )
    .expect("services build");
    services
        .seed_admin(config.admin.as_ref())
        .await
        .expect("admin seeded");

    TestContext {
        services,
        notifier,
        refresh_tokens,
    }
}

pub async fn init_app(
    services: AppServices,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .configure(|cfg| services.configure(cfg))
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(services.auth_middleware())
                    .configure(routes::config),
            ),
    )
    .await
}

/// Calls the app and returns the status with the parsed JSON body.
///
/// Errors raised by middleware are rendered the way the server would render
/// them, so callers see a status either way. Empty bodies come back as `Null`.
pub async fn call<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let body = actix_web::body::to_bytes(resp.into_body())
                .await
                .unwrap_or_default();
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }
}

pub async fn login<S, B>(app: &S, username: &str, password: &str) -> TokenPair
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    serde_json::from_value(body).expect("token pair")
}

pub async fn register<S, B>(app: &S, username: &str, password: &str) -> i32
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["user_id"].as_i64().expect("user_id") as i32
}
