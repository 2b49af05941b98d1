use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::verify_internal::verify_internal_ident;
use crate::db::prelude::*;
use crate::hub::registry::HubHandle;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub hub: HubHandle,
    pub internal_token: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, hub: HubHandle, internal_token: Option<String>) -> Self {
        Self {
            store,
            hub,
            internal_token,
        }
    }

    pub fn events(&self) -> EventRepository {
        EventRepository::new(self.store.clone())
    }

    pub fn leaderboards(&self) -> LeaderboardRepository {
        LeaderboardRepository::new(self.store.clone())
    }

    pub fn scores(&self) -> ScoreRepository {
        ScoreRepository::new(self.store.clone(), self.hub.clone())
    }
}

/// Builds the HTTP surface. Score producer routes are only mounted when an internal token is set.
pub fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let mut app = Router::new()
        //
        // general
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/checkhealth", get(checkhealth))
        //
        // event viewers
        .route("/api/events", get(list_events))
        .route("/api/events/{slug}", get(event_by_slug))
        .route("/api/events/{slug}/groups", get(event_groups))
        .route("/api/events/{slug}/games", get(event_games))
        .route("/api/events/{slug}/leaderboard", get(event_leaderboard))
        .route("/api/events/{slug}/scores", get(event_scores))
        .route("/api/events/{slug}/ws", get(event_subscribe));

    if state.internal_token.is_some() {
        let internal_routes = Router::new()
            .route("/api/admin/games/{id}/scores", post(create_score))
            .route("/api/admin/scores/{id}", put(update_score).delete(delete_score))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                verify_internal_ident,
            ));

        app = app.merge(internal_routes);
    } else {
        tracing::warn!("no internal token configured; score producer routes disabled");
    }

    app.layer(
        TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str());

            tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
        }),
    )
    .layer(from_fn(log_route_errors))
    .layer(cors)
    .with_state(state)
}

/// Binds the API listener on all interfaces.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    TcpListener::bind(socket_addr).await
}

/// Serves `app` until `shutdown` resolves.
///
/// Upgraded websocket connections are not waited on; they end when the hub closes their queues.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(server_url = %format!("http://{addr}"), "server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

/// Logs errors that route handlers attached to their response.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("event '{0}' not found")]
    EventNotFound(String),

    #[error("{0}")]
    AuthError(StatusCode),

    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string(), None)
            }

            RouteError::Store(StoreError::InvalidReference(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string(), Some(self))
            }

            // not necessarily an error for our server to care about
            RouteError::EventNotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),

            RouteError::AuthError(status) => (
                status.to_owned(),
                String::from("invalid authorization header"),
                Some(self),
            ),

            RouteError::InvalidBody(rejection) => {
                (rejection.status(), rejection.body_text(), Some(self))
            }
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
