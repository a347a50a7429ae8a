use axum::body::Body;
use axum::http::header::{CONTENT_RANGE, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::error::Error;
use crate::streamer::{StreamStatus, TabularResult};

use super::error::QueryError;

pub static ROWS_AFFECTED: HeaderName = HeaderName::from_static("rows-affected");

/// Status, headers and the buffered body of a finished stream
pub fn tabular_response(result: TabularResult) -> Result<Response, QueryError> {
    let status = match result.status {
        StreamStatus::Complete => StatusCode::OK,
        StreamStatus::Partial => StatusCode::PARTIAL_CONTENT,
    };

    let content_type = HeaderValue::try_from(result.content_type()).map_err(|_| {
        QueryError::Encoding(Error::Encoding(format!(
            "column types `{}` do not fit in a header",
            result.column_types_record
        )))
    })?;
    let content_range = HeaderValue::try_from(result.content_range.to_string())
        .map_err(|_| QueryError::Encoding(Error::Encoding("content range".to_string())))?;

    let mut response = Response::new(Body::from(result.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_RANGE, content_range);
    if let Some(rows_affected) = result.rows_affected {
        headers.insert(ROWS_AFFECTED.clone(), HeaderValue::from(rows_affected));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CommandKind, CommandSummary};
    use crate::streamer::command_result;

    #[test]
    fn test_command_response_headers() {
        let result = command_result(&CommandSummary {
            kind: CommandKind::Delete,
            rows_affected: 12,
            row_count: 0,
        });
        let response = tabular_response(result).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv; coltypes=");
        assert_eq!(response.headers()[CONTENT_RANGE], "rows 0-0/0");
        assert_eq!(response.headers()[&ROWS_AFFECTED], "12");
    }

    #[test]
    fn test_type_names_that_are_not_header_safe() {
        let mut result = command_result(&CommandSummary {
            kind: CommandKind::Select,
            rows_affected: 0,
            row_count: 0,
        });
        result.column_types_record = "line\nbreak".to_string();
        assert!(matches!(
            tabular_response(result),
            Err(QueryError::Encoding(_))
        ));
    }
}
