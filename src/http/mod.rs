//! The `/query` endpoint.
pub mod admission;
pub mod error;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::db::{Connector, Session};
use crate::error::{Error, Result};
use crate::streamer::{TabularResult, stream_execution};

use self::admission::admit;
use self::error::{QueryError, QueryResult};
use self::response::tabular_response;

/// Process-wide, read-only state shared by every request
pub struct AppState<C> {
    pub connector: Arc<C>,
    pub config: Arc<Config>,
}

impl<C> AppState<C> {
    pub fn new(connector: C, config: Config) -> Self {
        Self {
            connector: Arc::new(connector),
            config: Arc::new(config),
        }
    }
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            config: Arc::clone(&self.config),
        }
    }
}

/// Every method is routed so that admission answers 405 itself
pub fn create_router<C: Connector>(state: AppState<C>) -> Router {
    Router::new()
        .route("/query", any(query::<C>))
        .with_state(state)
}

async fn query<C: Connector>(
    State(state): State<AppState<C>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    match handle_query(&state, &method, &headers, body).await {
        Ok(response) => response,
        Err(error) => {
            debug!(status = %error.status_code(), %error, "query rejected");
            error.into_response()
        }
    }
}

/// Admit, execute and stream one query, closing the session on every path
pub async fn handle_query<C: Connector>(
    state: &AppState<C>,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
) -> QueryResult<Response> {
    let config = &state.config;
    let admission = admit(
        method,
        headers,
        body,
        config.default_ceiling,
        config.max_query_bytes,
    )
    .await?;
    debug!(
        ceiling = admission.ceiling,
        query_bytes = admission.query.len(),
        "query admitted"
    );
    trace!(query = %String::from_utf8_lossy(&admission.query));

    let mut session = state.connector.connect().await.map_err(|e| {
        warn!(error = %e, "database connection failed");
        QueryError::Connection(e)
    })?;

    let outcome = run_query(
        &mut session,
        &admission.query,
        admission.ceiling,
        config.query_timeout,
    )
    .await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "closing the database session failed");
    }

    let result = outcome.map_err(|e| {
        warn!(error = %e, "query failed");
        QueryError::from_execution(e)
    })?;
    debug!(
        status = ?result.status,
        content_range = %result.content_range,
        bytes = result.body.len(),
        "query streamed"
    );
    tabular_response(result)
}

async fn run_query<S: Session>(
    session: &mut S,
    query: &[u8],
    ceiling: usize,
    timeout: Option<Duration>,
) -> Result<TabularResult> {
    let work = async {
        let execution = session.execute(query).await?;
        stream_execution(execution, ceiling).await
    };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_elapsed| Error::Timeout(limit))?,
        None => work.await,
    }
}
