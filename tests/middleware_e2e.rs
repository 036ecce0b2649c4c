//! End-to-end coverage over the axum host: a small app with a session
//! middleware at the root, an auth guard on a pathless layout, and a
//! terminal handler standing in for the framework dispatcher.

use std::sync::{Arc, LazyLock};

use serde_json::json;
use tokio::net::TcpListener;

use trellis::{
    AxumAdapter, IntoResponse, MemorySessionStorage, Middleware, MiddlewareArgs,
    MiddlewareRequestHandler, Outcome, Response, RouteDefinition, RouteManifest, ServerBuild,
    SessionMiddleware, StaticBuild, Token, middleware_fn, session_token, single_fetch, terminal_fn,
};

static USER: LazyLock<Token<String>> = LazyLock::new(|| Token::new("user"));

/// Redirects to the login page unless the session carries a user id; on
/// success the user lands in the context for downstream handlers.
fn require_auth() -> Arc<dyn Middleware> {
    middleware_fn(|args: MiddlewareArgs| async move {
        let session = match args.context.get(session_token()) {
            Ok(session) => session,
            Err(error) => return Outcome::Failure(error.into()),
        };
        let user = {
            let mut session = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            session.get("userId")
        };
        match user.and_then(|value| value.as_str().map(str::to_string)) {
            Some(user) => {
                args.context.set(*USER, user);
                args.next.run().await.into()
            }
            None => {
                let target = format!("/login?redirectTo={}", args.request.path());
                Outcome::ShortCircuit(Response::redirect(&target))
            }
        }
    })
}

fn manifest() -> RouteManifest {
    let storage = Arc::new(MemorySessionStorage::new("__session"));
    RouteManifest::new()
        .route(
            RouteDefinition::new("root")
                .middleware(vec![Arc::new(SessionMiddleware::new(storage))]),
        )
        .route(RouteDefinition::new("login").parent("root").path("login"))
        .route(
            RouteDefinition::new("protected")
                .parent("root")
                .middleware(vec![require_auth()]),
        )
        .route(
            RouteDefinition::new("dashboard")
                .parent("protected")
                .path("dashboard"),
        )
}

/// Stand-in for the framework's render/loader/action dispatcher.
fn dispatcher() -> trellis::TerminalHandler {
    terminal_fn(|request, context| async move {
        match request.path() {
            "/" => Outcome::Respond("home".into_response()),
            "/login" => {
                let session = match context.get(session_token()) {
                    Ok(session) => session,
                    Err(error) => return Outcome::Failure(error.into()),
                };
                match request.query_params().get("as") {
                    Some(name) => {
                        session
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .set("userId", json!(name));
                        Outcome::Respond(Response::text("logged in"))
                    }
                    None => Outcome::Respond(Response::text("login page")),
                }
            }
            "/dashboard" => match context.get(*USER) {
                Ok(user) => Outcome::Respond(Response::text(&format!("hello {user}"))),
                Err(error) => Outcome::Failure(error.into()),
            },
            _ => Outcome::Respond(Response::text("not found").with_status(404)),
        }
    })
}

async fn spawn_app() -> String {
    let build = StaticBuild::new(ServerBuild::new(manifest()));
    let handler = MiddlewareRequestHandler::new(Arc::new(build), dispatcher());
    let router = AxumAdapter::new(handler).into_router();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_home_page_runs_terminal_only() {
    let base = spawn_app().await;
    let response = client().get(format!("{base}/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "home");
}

#[tokio::test]
async fn test_unauthenticated_dashboard_redirects_to_login() {
    let base = spawn_app().await;
    let response = client()
        .get(format!("{base}/dashboard"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(
        response.headers().get("Location").unwrap(),
        "/login?redirectTo=/dashboard"
    );
}

#[tokio::test]
async fn test_data_request_redirect_is_rewritten_in_band() {
    let base = spawn_app().await;
    let response = client()
        .get(format!("{base}/dashboard.data"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().get("Location").is_none());
    assert_eq!(
        response
            .headers()
            .get(single_fetch::MARKER_HEADER)
            .unwrap(),
        single_fetch::MARKER_VALUE
    );
    assert_eq!(
        response.headers().get("Content-Type").unwrap(),
        single_fetch::TURBO_STREAM_CONTENT_TYPE
    );

    let body = response.text().await.unwrap();
    assert!(body.starts_with("[[\"SingleFetchRedirect\",1]"));
    assert!(body.contains("\"redirect\",\"/login?redirectTo=/dashboard\""));
    assert!(body.contains("\"status\",302"));
}

#[tokio::test]
async fn test_login_commits_session_and_unlocks_dashboard() {
    let base = spawn_app().await;
    let client = client();

    let login = client
        .get(format!("{base}/login?as=alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);

    let cookie = login
        .headers()
        .get("Set-Cookie")
        .expect("mutated session must be committed")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let dashboard = client
        .get(format!("{base}/dashboard"))
        .header("Cookie", cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(dashboard.status(), 200);
    assert_eq!(dashboard.text().await.unwrap(), "hello alice");
}

#[tokio::test]
async fn test_unknown_page_renders_dispatcher_404() {
    let base = spawn_app().await;
    let response = client()
        .get(format!("{base}/missing"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "not found");
}
