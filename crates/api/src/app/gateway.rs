//! The generic dispatch path.
//!
//! One wildcard route serves every registered endpoint: resolve the
//! descriptor by name, bind parameters, run the handler inside a fresh
//! request context, then map the returned envelope onto an HTTP response.

use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tokio::io::AsyncReadExt;
use tokio_stream::wrappers::ReceiverStream;

use gatehouse_core::{
    ApiContext, ApiError, ApiRegistry, ApiResponse, Method as ApiMethod, RequestParts, ResponseKind,
    bind,
};

/// Shared router state: the populated registry plus the health/stop flag.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ApiRegistry>,
    pub stopped: Arc<AtomicBool>,
}

/// `GET /__check`: static health status, independent of the registry.
pub async fn health(State(state): State<AppState>) -> &'static str {
    if state.stopped.load(Ordering::Relaxed) {
        "STOP"
    } else {
        "OK"
    }
}

/// Fallback for anything outside `/api` and `/__check`.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 not found").into_response()
}

/// `{GET,POST,PUT,DELETE} /api/*name`: the gateway.
pub async fn dispatch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: axum::http::Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let api_method = match ApiMethod::from_str(method.as_str()) {
        Ok(m) => m,
        Err(_) => return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response(),
    };

    let Some(descriptor) = state.registry.lookup(&name) else {
        return (
            StatusCode::NOT_FOUND,
            format!("API {name} with method {method} not found"),
        )
            .into_response();
    };

    let Some(handler) = descriptor.handler() else {
        tracing::error!(endpoint = %name, "descriptor has no handler");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("API {name} has no callable function registered"),
        )
            .into_response();
    };

    let request = RequestParts {
        method: api_method,
        query,
        body: Some(body),
    };

    let args = match bind(descriptor.params(), &request) {
        Ok(args) => args,
        Err(err) => return error_response(err),
    };

    let ctx = ApiContext {
        api_name: Some(name.clone()),
        api_method: Some(api_method.to_string()),
        remote_addr: header_str(&headers, "x-forwarded-for"),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
        path: Some(uri.path().to_string()),
        params: Some(args.to_value()),
        ..Default::default()
    };

    match ApiContext::scope(ctx, handler.call(args)).await {
        Ok(resp) => respond(resp).await,
        Err(err) => error_response(err),
    }
}

/// Map an [`ApiError`] onto the transport per the taxonomy: invalid usage
/// is 4xx, business errors stay 200 inside the envelope, the rest is 500.
fn error_response(err: ApiError) -> Response {
    match err {
        ApiError::InvalidUsage(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        ApiError::Api { code, message, .. } => (
            StatusCode::OK,
            Json(serde_json::json!({"code": code, "message": message})),
        )
            .into_response(),
        ApiError::Serialization(message) => {
            tracing::error!(%message, "response serialization failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "response serialization failed").into_response()
        }
        ApiError::Internal(message) => {
            tracing::error!(%message, "handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Turn an envelope into an HTTP response.
async fn respond(resp: ApiResponse) -> Response {
    if resp.is_raw() {
        let status =
            StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, resp.body.clone().unwrap_or_default()).into_response();
        apply_headers(&mut response, &resp.headers);
        return response;
    }

    if matches!(resp.kind, ResponseKind::Json) {
        return match resp.to_json() {
            Ok(value) => {
                let mut response = Json(value).into_response();
                apply_headers(&mut response, &resp.headers);
                response
            }
            Err(err) => error_response(err),
        };
    }

    let extra_headers = resp.headers;
    let mut response = match resp.kind {
        ResponseKind::Json => unreachable!("handled above"),
        ResponseKind::Stream {
            producer,
            content_type,
        } => body_response(Body::from_stream(producer), &content_type, None),
        ResponseKind::File {
            path,
            content_type,
            filename,
        } => match tokio::fs::read(&path).await {
            Ok(bytes) => body_response(
                Body::from(bytes),
                content_type.as_deref().unwrap_or("application/octet-stream"),
                filename.as_deref(),
            ),
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "file response failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "file response failed").into_response()
            }
        },
        ResponseKind::FileStream {
            path,
            content_type,
            filename,
        } => match stream_file(path).await {
            Ok(stream) => body_response(
                Body::from_stream(stream),
                content_type.as_deref().unwrap_or("application/octet-stream"),
                filename.as_deref(),
            ),
            Err(err) => {
                tracing::error!(%err, "file stream failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "file response failed").into_response()
            }
        },
    };
    apply_headers(&mut response, &extra_headers);
    response
}

fn body_response(body: Body, content_type: &str, filename: Option<&str>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(filename) = filename {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    }
    builder
        .body(body)
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "bad response headers").into_response())
}

/// Read a file into 64 KiB chunks behind a channel, so large downloads
/// never buffer whole in memory.
async fn stream_file(path: PathBuf) -> io::Result<ReceiverStream<Result<Bytes, io::Error>>> {
    let mut file = tokio::fs::File::open(&path).await?;
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, io::Error>>(8);

    tokio::spawn(async move {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    break;
                }
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}

fn apply_headers(response: &mut Response, headers: &[(String, String)]) {
    for (name, value) in headers {
        match (
            HeaderName::from_str(name),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
