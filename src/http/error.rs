use std::time::Duration;

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::Error;
use crate::protocol::response::ErrPayload;

use super::admission::AdmissionError;

pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Every way a request can fail. Only `Query` carries a body: the database's own message.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("database connection failed: {0}")]
    Connection(#[source] Error),

    #[error("query failed: {0}")]
    Query(ErrPayload),

    #[error("column type resolution failed: {0}")]
    TypeResolution(#[source] Error),

    #[error("row encoding failed: {0}")]
    Encoding(#[source] Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Classify a collaborator error raised after the connection was established
    pub fn from_execution(error: Error) -> Self {
        match error {
            Error::ServerError(payload) => QueryError::Query(payload),
            e @ Error::UnknownColumnType { .. } => QueryError::TypeResolution(e),
            e @ Error::Encoding(_) => QueryError::Encoding(e),
            Error::Timeout(after) => QueryError::Timeout(after),
            e => QueryError::Connection(e),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::Admission(AdmissionError::MethodNotAllowed(_)) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            QueryError::Admission(AdmissionError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            QueryError::Admission(AdmissionError::UnreadableBody(_)) => StatusCode::BAD_REQUEST,
            QueryError::Connection(_)
            | QueryError::Query(_)
            | QueryError::TypeResolution(_)
            | QueryError::Encoding(_)
            | QueryError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            QueryError::Query(payload) => (status, payload.to_string()).into_response(),
            QueryError::Admission(AdmissionError::MethodNotAllowed(_)) => {
                (status, [(ALLOW, HeaderValue::from_static("POST"))]).into_response()
            }
            _ => status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use http_body_util::BodyExt;

    use super::*;

    async fn body(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_classification() {
        let payload = ErrPayload {
            error_code: 1146,
            sql_state: "42S02".to_string(),
            message: "Table 'test.t' doesn't exist".to_string(),
        };
        assert!(matches!(
            QueryError::from_execution(Error::ServerError(payload)),
            QueryError::Query(_)
        ));
        assert!(matches!(
            QueryError::from_execution(Error::UnknownColumnType {
                column: "g".to_string(),
                type_id: 7
            }),
            QueryError::TypeResolution(_)
        ));
        assert!(matches!(
            QueryError::from_execution(Error::Encoding("bad".to_string())),
            QueryError::Encoding(_)
        ));
        assert!(matches!(
            QueryError::from_execution(Error::UnexpectedEof),
            QueryError::Connection(_)
        ));
        assert!(matches!(
            QueryError::from_execution(Error::Timeout(Duration::from_secs(1))),
            QueryError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_query_error_body_is_database_message() {
        let response = QueryError::Query(ErrPayload {
            error_code: 1064,
            sql_state: "42000".to_string(),
            message: "You have an error in your SQL syntax".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(response).await,
            b"ERROR 1064 (42000): You have an error in your SQL syntax"
        );
    }

    #[tokio::test]
    async fn test_other_errors_have_no_body() {
        let response = QueryError::Connection(Error::InvalidPacket).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(response).await.is_empty());

        let response =
            QueryError::from(AdmissionError::MethodNotAllowed(Method::GET)).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
        assert!(body(response).await.is_empty());
    }
}
