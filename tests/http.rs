mod common;

use std::net::TcpListener;

use actix_web::dev::ServerHandle;
use actix_web::middleware::Logger;
use actix_web::{rt, web, App, HttpServer};
use common::{test_context, ADMIN_PASSWORD, ADMIN_USERNAME};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use todo_auth::auth::TokenPair;
use todo_auth::routes::{self, health};
use todo_auth::services::AppServices;

/// Serves the app on an ephemeral local port until the handle is stopped.
fn spawn_server(services: AppServices) -> (String, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server = HttpServer::new(move || {
        App::new()
            .configure(|cfg| services.configure(cfg))
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(services.auth_middleware())
                    .configure(routes::config),
            )
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();

    let handle = server.handle();
    rt::spawn(server);
    (format!("http://127.0.0.1:{}", port), handle)
}

async fn login(client: &reqwest::Client, base: &str) -> TokenPair {
    let resp = client
        .post(format!("{}/api/auth/login", base))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.json().await.expect("token pair")
}

#[actix_web::test]
async fn test_missing_token_is_rejected_over_http() {
    let ctx = test_context().await;
    let (base, handle) = spawn_server(ctx.services.clone());
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/users/me", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let body: Value = resp.json().await.expect("json error body");
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Missing token");

    handle.stop(true).await;
}

#[test_log::test(actix_web::test)]
async fn test_login_then_profile_over_http() {
    let ctx = test_context().await;
    let (base, handle) = spawn_server(ctx.services.clone());
    let client = reqwest::Client::new();

    let pair = login(&client, &base).await;
    assert_eq!(pair.token_type, "Bearer");

    let profile: Value = client
        .get(format!("{}/api/users/me", base))
        .bearer_auth(&pair.access_token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("profile");
    assert_eq!(profile["username"], ADMIN_USERNAME);

    handle.stop(true).await;
}

#[test_log::test(actix_web::test)]
async fn test_concurrent_refresh_has_one_winner_over_http() {
    let ctx = test_context().await;
    let (base, handle) = spawn_server(ctx.services.clone());
    let client = reqwest::Client::new();
    let pair = login(&client, &base).await;

    let refresh = || {
        client
            .post(format!("{}/api/auth/token", base))
            .header("token", pair.refresh_token.as_str())
            .send()
    };
    let (a, b) = tokio::join!(refresh(), refresh());
    let mut statuses = vec![a.unwrap().status(), b.unwrap().status()];
    statuses.sort();

    assert_eq!(
        statuses,
        vec![reqwest::StatusCode::OK, reqwest::StatusCode::BAD_REQUEST]
    );
    assert_eq!(ctx.refresh_tokens.len(), 1);

    handle.stop(true).await;
}
