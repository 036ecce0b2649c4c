//! Small app wiring the runtime into an axum host: session middleware on
//! the root route, an auth guard on a pathless layout, and a terminal
//! handler standing in for the framework dispatcher.
//!
//! Run with `cargo run --example auth_app`, then:
//!
//! ```text
//! curl -i http://127.0.0.1:3000/dashboard            # 302 to /login
//! curl -i "http://127.0.0.1:3000/login?as=alice"     # commits the session
//! curl -i -H "Cookie: __session=<id>" http://127.0.0.1:3000/dashboard
//! ```

use std::sync::{Arc, LazyLock};

use serde_json::json;
use tokio::net::TcpListener;

use trellis::{
    AxumAdapter, IntoResponse, MemorySessionStorage, Middleware, MiddlewareArgs,
    MiddlewareRequestHandler, Outcome, Response, RouteDefinition, RouteManifest, ServerBuild,
    SessionMiddleware, StaticBuild, TerminalHandler, Token, middleware_fn, session_token,
    terminal_fn,
};

static USER: LazyLock<Token<String>> = LazyLock::new(|| Token::new("user"));

fn require_auth() -> Arc<dyn Middleware> {
    middleware_fn(|args: MiddlewareArgs| async move {
        let session = match args.context.get(session_token()) {
            Ok(session) => session,
            Err(error) => return Outcome::Failure(error.into()),
        };
        let user = {
            let mut session = session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
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

fn dispatcher() -> TerminalHandler {
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
                        Outcome::Respond(Response::text(&format!("logged in as {name}")))
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let build = StaticBuild::new(ServerBuild::new(manifest()));
    let handler = MiddlewareRequestHandler::new(Arc::new(build), dispatcher());
    let router = AxumAdapter::new(handler).into_router();

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    println!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
