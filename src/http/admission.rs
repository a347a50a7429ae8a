use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, Method};
use thiserror::Error;

pub static MAX_CONTENT_LENGTH: HeaderName = HeaderName::from_static("max-content-length");

/// The only accepted request media type
pub const SQL_MEDIA_TYPE: &str = "text/sql";

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("unsupported content type `{0}`")]
    UnsupportedMediaType(String),

    #[error("could not read the query: {0}")]
    UnreadableBody(String),
}

/// An admitted request: the query bytes and the ceiling to stream them under
#[derive(Debug, Clone)]
pub struct Admission {
    pub query: Bytes,
    pub ceiling: usize,
}

pub fn check_method(method: &Method) -> Result<(), AdmissionError> {
    if method == Method::POST {
        Ok(())
    } else {
        Err(AdmissionError::MethodNotAllowed(method.clone()))
    }
}

/// An absent content type is treated as `text/sql`. Parameters are ignored.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), AdmissionError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(());
    };
    let value = value
        .to_str()
        .map_err(|_| AdmissionError::UnsupportedMediaType(format!("{value:?}")))?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(SQL_MEDIA_TYPE) {
        Ok(())
    } else {
        Err(AdmissionError::UnsupportedMediaType(value.to_owned()))
    }
}

/// `Max-Content-Length` when it holds a positive integer, `default` otherwise
pub fn resolve_ceiling(headers: &HeaderMap, default: usize) -> usize {
    headers
        .get(&MAX_CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&ceiling| ceiling > 0)
        .unwrap_or(default)
}

/// Validate a request and read its body as the query text.
///
/// Checks run before the body is touched, so a rejected request costs nothing.
pub async fn admit(
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    default_ceiling: usize,
    max_query_bytes: usize,
) -> Result<Admission, AdmissionError> {
    check_method(method)?;
    check_content_type(headers)?;
    let ceiling = resolve_ceiling(headers, default_ceiling);
    let query = axum::body::to_bytes(body, max_query_bytes)
        .await
        .map_err(|e| AdmissionError::UnreadableBody(e.to_string()))?;
    Ok(Admission { query, ceiling })
}
