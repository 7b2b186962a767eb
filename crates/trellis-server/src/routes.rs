//! Routes served by the binary.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use trellis::{handler_fn, Engine, ErrorLogger, Format, HandlerFunc, Router};
use trellis_auth::{basic_auth, Account, AUTH_USER_KEY};

#[derive(Debug, Deserialize, Serialize)]
struct Echo {
    message: String,
}

/// Builds the frozen router.
///
/// Fails when the account list cannot back the `/admin` group.
pub fn build_router(accounts: Vec<Account>) -> anyhow::Result<Router> {
    let auth = basic_auth(accounts).context("invalid account configuration")?;

    let mut engine = Engine::with_default_middleware();
    engine.middleware(ErrorLogger::new());
    engine.not_found([not_found()]);

    engine.get("/ping", [ping()])?;
    engine.post("/echo", [echo()])?;

    let admin = engine.group_with("/admin", [auth]);
    admin.get("/whoami", [whoami()])?;

    Ok(engine.into_router()?)
}

fn ping() -> HandlerFunc {
    handler_fn(|c| Box::pin(async move { c.string(200, "pong") }))
}

fn echo() -> HandlerFunc {
    handler_fn(|c| {
        Box::pin(async move {
            if let Some(body) = c.bind_json::<Echo>() {
                c.json(200, &body);
            }
        })
    })
}

fn whoami() -> HandlerFunc {
    handler_fn(|c| {
        Box::pin(async move {
            let user = c.get::<String>(AUTH_USER_KEY).clone();
            c.json(200, &serde_json::json!({ "user": user }));
        })
    })
}

fn not_found() -> HandlerFunc {
    handler_fn(|c| {
        Box::pin(async move {
            let path = c.request().path.clone();
            c.render(
                None,
                Format::Json,
                &serde_json::json!({ "error": "not found", "path": path }),
            );
        })
    })
}

#[cfg(test)]
mod tests {
    use trellis::Request;
    use trellis_auth::encode_token;

    use super::*;

    fn router() -> Router {
        build_router(vec![Account::new("admin", "secret")]).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let res = router().handle(Request::get("/ping")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_string().as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_echo() {
        let router = router();
        let res = router
            .handle(Request::post("/echo").with_body(r#"{"message":"hi"}"#))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_string().as_deref(), Some(r#"{"message":"hi"}"#));

        let res = router.handle(Request::post("/echo").with_body("nope")).await;
        assert_eq!(res.status, 400);
        let body: serde_json::Value = res.json().unwrap();
        assert_eq!(body[0]["kind"], "binding");
    }

    #[tokio::test]
    async fn test_admin_requires_credentials() {
        let router = router();
        let res = router.handle(Request::get("/admin/whoami")).await;
        assert_eq!(res.status, 401);
        assert!(res.get_header("WWW-Authenticate").is_some());

        let res = router
            .handle(
                Request::get("/admin/whoami")
                    .with_header("Authorization", encode_token("admin", "secret")),
            )
            .await;
        assert_eq!(res.status, 200);
        let body: serde_json::Value = res.json().unwrap();
        assert_eq!(body["user"], "admin");
    }

    #[tokio::test]
    async fn test_not_found_is_json() {
        let res = router().handle(Request::get("/missing")).await;
        assert_eq!(res.status, 404);
        let body: serde_json::Value = res.json().unwrap();
        assert_eq!(body["path"], "/missing");
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let res = router().handle(Request::get("/echo")).await;
        assert_eq!(res.status, 405);
    }

    #[test]
    fn test_empty_accounts_refused() {
        let err = build_router(Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "invalid account configuration");
        assert!(format!("{err:#}").contains("at least one account is required"));
    }
}
