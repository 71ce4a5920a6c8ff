use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, products, reviews};

pub fn build_app(state: AppState) -> Router {
    let upload_limit = state.config.upload_limit_bytes;
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(products::router(upload_limit))
                .merge(reviews::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "softswap-test-boundary";

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_req(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut b = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_req(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    fn multipart_req(
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\nContent-Type: application/zip\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/products")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn register(app: &Router, name: &str, email: &str) -> String {
        let (status, body) = send(
            app,
            json_req(
                Method::POST,
                "/api/auth/register",
                None,
                json!({"name": name, "email": email, "password": "pw1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create(app: &Router, token: &str, title: &str, version: &str) -> (StatusCode, Value) {
        send(
            app,
            multipart_req(
                token,
                &[
                    ("title", title),
                    ("version", version),
                    ("description", "a tool"),
                    ("license", "MIT"),
                ],
                Some(("tool.zip", b"PK\x03\x04zip")),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(bare_req(Method::GET, "/api/health", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_and_profile() {
        let app = build_app(AppState::fake());
        let token = register(&app, "Alice", "a@x.com").await;

        let (status, body) = send(
            &app,
            json_req(
                Method::POST,
                "/api/auth/login",
                None,
                json!({"email": "a@x.com", "password": "pw1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Alice");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            json_req(
                Method::POST,
                "/api/auth/login",
                None,
                json!({"email": "a@x.com", "password": "nope"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, body) = send(&app, bare_req(Method::GET, "/api/user", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "a@x.com");

        let (status, _) = send(&app, bare_req(Method::GET, "/api/user", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, bare_req(Method::GET, "/api/user", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = build_app(AppState::fake());
        register(&app, "Alice", "a@x.com").await;
        let (status, body) = send(
            &app,
            json_req(
                Method::POST,
                "/api/auth/register",
                None,
                json!({"name": "Other", "email": "a@x.com", "password": "pw2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn forgot_password_answers_the_same_for_unknown_email() {
        let app = build_app(AppState::fake());
        register(&app, "Alice", "a@x.com").await;
        let mut bodies = Vec::new();
        for email in ["a@x.com", "nobody@x.com"] {
            let (status, body) = send(
                &app,
                json_req(
                    Method::POST,
                    "/api/auth/forgot-password",
                    None,
                    json!({ "email": email }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            bodies.push(body);
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn marketplace_scenario() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "Alice", "a@x.com").await;
        let bob = register(&app, "Bob", "b@x.com").await;

        let res = app
            .clone()
            .oneshot(multipart_req(
                &alice,
                &[
                    ("title", "Tool"),
                    ("version", "1.0"),
                    ("description", "a tool"),
                    ("license", "MIT"),
                ],
                Some(("tool.zip", b"PK\x03\x04zip")),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/api/products/"));

        let (status, body) = create(&app, &bob, "Tool", "1.0").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");

        let (status, body) = create(&app, &alice, "Tool", "2.0").await;
        assert_eq!(status, StatusCode::CREATED);
        let v2 = body["product"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["product"]["seller"]["name"], "Alice");
        assert_eq!(body["product"]["price"], 0.0);

        let (status, body) = send(&app, bare_req(Method::GET, "/api/products", None)).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["version"], "2.0");
        assert_eq!(listed[0]["is_latest"], true);

        let uri = format!("/api/products/{v2}");
        let (status, body) = send(
            &app,
            json_req(Method::PUT, &uri, Some(&bob), json!({"description": "hijacked"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, _) = send(
            &app,
            json_req(Method::PUT, &uri, None, json!({"description": "anon"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, bare_req(Method::DELETE, &uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = send(
            &app,
            json_req(
                Method::POST,
                &format!("/api/reviews/{v2}"),
                None,
                json!({"rating": 5, "comment": "anon"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, body) = send(
            &app,
            json_req(
                Method::PUT,
                &uri,
                Some(&alice),
                json!({"description": "better", "price": 99}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["product"]["description"], "better");
        assert_eq!(body["product"]["price"], 0.0);

        for (token, rating) in [(&alice, 4), (&bob, 2)] {
            let (status, _) = send(
                &app,
                json_req(
                    Method::POST,
                    &format!("/api/reviews/{v2}"),
                    Some(token),
                    json!({"rating": rating, "comment": "ok"}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, bare_req(Method::GET, &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["review_count"], 2);
        assert_eq!(body["average_rating"], 3.0);
        let versions: Vec<_> = body["versions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["version"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(versions, ["2.0", "1.0"]);

        let (status, body) =
            send(&app, bare_req(Method::GET, "/api/user/products", Some(&alice))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, bare_req(Method::DELETE, &uri, Some(&bob))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, bare_req(Method::DELETE, &uri, Some(&alice))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, bare_req(Method::GET, &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (_, body) = send(&app, bare_req(Method::GET, "/api/products", None)).await;
        assert_eq!(body[0]["version"], "1.0");
    }

    #[tokio::test]
    async fn create_without_artifact_is_rejected() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "Alice", "a@x.com").await;
        let (status, body) = send(
            &app,
            multipart_req(
                &alice,
                &[("title", "Tool"), ("version", "1.0"), ("description", "d"), ("license", "MIT")],
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn review_of_unknown_product_is_not_found() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "Alice", "a@x.com").await;
        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                &format!("/api/reviews/{}", uuid::Uuid::new_v4()),
                Some(&alice),
                json!({"rating": 3, "comment": "x"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
