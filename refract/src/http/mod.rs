//! HTTP adapter: translates engine outcomes into responses.
//!
//! One fallback route serves the whole surface: the root path answers
//! with version JSON (or a configured redirect), `params/...` paths
//! answer with parsed params as indented JSON, and everything else runs
//! through the engine. Only `GET` and `HEAD` are served.

mod headers;

use crate::engine::{Engine, Outcome, Request, RequestContext};
use crate::error::{Error, STATUS_CLIENT_CLOSED_REQUEST};
use crate::params::{parse, Params};
use crate::VERSION;
use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use axum::Router;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub use headers::cache_control;

/// Builds the service router around an engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new().fallback(handle).with_state(engine)
}

/// Binds and serves until ctrl-c, running engine lifecycle around the
/// accept loop.
pub async fn serve(engine: Arc<Engine>, addr: SocketAddr) -> Result<(), Error> {
    engine.startup().await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(Arc::clone(&engine)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    engine.shutdown().await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle(State(engine): State<Arc<Engine>>, req: axum::extract::Request) -> Response {
    let method = req.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return status_only(StatusCode::METHOD_NOT_ALLOWED);
    }

    let path = req.uri().path().trim_start_matches('/').to_string();
    if path.is_empty() {
        return match &engine.config().base_path_redirect {
            Some(target) => redirect(target),
            None => json_response(
                StatusCode::OK,
                &serde_json::json!({"refract": {"version": VERSION}}),
                &method,
                false,
            ),
        };
    }

    let params = parse(&path);
    if params.introspect {
        if engine.config().disable_params_endpoint {
            return status_only(StatusCode::OK);
        }
        return json_response(StatusCode::OK, &params, &method, true);
    }

    let (ctx, _scope) = RequestContext::root();
    let engine_req = Request {
        ctx,
        method: method.clone(),
        headers: req.headers().clone(),
    };
    let outcome = engine.execute(&engine_req, params.clone()).await;
    render(&engine, &params, outcome, &method)
}

/// Applies the response rendering rules to a terminal outcome.
fn render(engine: &Engine, params: &Params, outcome: Outcome, method: &Method) -> Response {
    let Outcome { blob, error } = outcome;

    if error.is_none() && params.meta {
        if let Some(meta) = blob.as_ref().and_then(|b| b.meta()) {
            return json_response(StatusCode::OK, meta, method, false);
        }
    }

    match error {
        Some(error) => {
            if error.is_cancellation() {
                return status_only(
                    StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                );
            }
            let error = error.wrap();
            let status = StatusCode::from_u16(error.status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if engine.config().disable_error_body {
                return status_only(status);
            }
            match blob.filter(|b| !b.is_empty()) {
                Some(blob) => blob_response(status, &blob, method, None),
                None => json_response(status, &error, method, false),
            }
        }
        None => match blob.filter(|b| !b.is_empty()) {
            Some(blob) => {
                let cache = Some((
                    engine.config().cache_header_ttl,
                    engine.config().cache_header_swr,
                ));
                blob_response(StatusCode::OK, &blob, method, cache)
            }
            None => status_only(StatusCode::OK),
        },
    }
}

fn status_only(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_default()
}

fn redirect(target: &str) -> Response {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(LOCATION, target)
        .body(Body::empty())
        .unwrap_or_default()
}

fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
    method: &Method,
    indent: bool,
) -> Response {
    let body = if indent {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .unwrap_or_default();

    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len());
    if *method == Method::HEAD {
        return response.body(Body::empty()).unwrap_or_default();
    }
    response.body(Body::from(body)).unwrap_or_default()
}

fn blob_response(
    status: StatusCode,
    blob: &crate::blob::Blob,
    method: &Method,
    cache: Option<(std::time::Duration, std::time::Duration)>,
) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(content_type) = blob.content_type().parse() {
        headers.insert(CONTENT_TYPE, content_type);
    }
    if let Ok(length) = blob.len().to_string().parse() {
        headers.insert(CONTENT_LENGTH, length);
    }
    if let Some((ttl, swr)) = cache {
        if let Ok(expires) = headers::expires_value(ttl).parse() {
            headers.insert(EXPIRES, expires);
        }
        if let Ok(control) = cache_control(ttl, swr).parse() {
            headers.insert(CACHE_CONTROL, control);
        }
    }

    let body = if *method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(blob.data())
    };
    let mut response = Response::builder().status(status);
    if let Some(map) = response.headers_mut() {
        map.extend(headers);
    }
    response.body(body).unwrap_or_default()
}
