//! trellis-server
//!
//! Serves a small trellis application over HTTP/1.

mod routes;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use trellis::{Method, Request, Response, Router};
use trellis_auth::Account;

/// Middleware-chained HTTP dispatch demo server.
#[derive(Parser)]
#[command(name = "trellis-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, env = "TRELLIS_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Account allowed into /admin, as user:password (repeatable).
    #[arg(long = "account", env = "TRELLIS_ACCOUNTS", value_delimiter = ',')]
    accounts: Vec<Account>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let router = Arc::new(routes::build_router(cli.accounts)?);

    let listener = TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, "listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let router = Arc::clone(&router);
        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, Arc::clone(&router), peer));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer, error = %err, "error serving connection");
            }
        });
    }
}

async fn handle_request(
    req: HyperRequest<Incoming>,
    router: Arc<Router>,
    peer: SocketAddr,
) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        let mut res = Response::new(405);
        res.body = b"405 method not allowed".to_vec();
        return Ok(into_hyper(res));
    };

    let mut request = Request::new(method, req.uri().path()).with_remote_addr(peer.to_string());
    for (key, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.push((key.to_string(), value.to_string()));
        }
    }
    request.body = match req.into_body().collect().await {
        Ok(body) => body.to_bytes().to_vec(),
        Err(err) => {
            warn!(%peer, error = %err, "failed to read request body");
            return Ok(into_hyper(Response::new(400)));
        }
    };

    Ok(into_hyper(router.handle(request).await))
}

fn into_hyper(res: Response) -> HyperResponse<Full<Bytes>> {
    let mut out = HyperResponse::new(Full::new(Bytes::from(res.body)));
    *out.status_mut() =
        StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (key, value) in res.headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => warn!(header = %key, "dropping invalid response header"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_accounts() {
        let cli = Cli::try_parse_from([
            "trellis-server",
            "--account",
            "alice:pw1",
            "--account",
            "bob:pw:2",
            "--addr",
            "0.0.0.0:8080",
        ])
        .unwrap();
        assert_eq!(
            cli.accounts,
            [Account::new("alice", "pw1"), Account::new("bob", "pw:2")]
        );
        assert_eq!(cli.addr.port(), 8080);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_rejects_malformed_account() {
        assert!(Cli::try_parse_from(["trellis-server", "--account", "alice"]).is_err());
    }

    #[test]
    fn test_into_hyper() {
        let mut res = Response::new(201);
        res.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        res.headers.insert("Bad\nName".to_string(), "x".to_string());
        res.body = b"{}".to_vec();

        let out = into_hyper(res);
        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers()["content-type"], "application/json");
        assert_eq!(out.headers().len(), 1);
    }
}
