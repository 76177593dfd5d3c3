use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::App;
use crate::config::SUBSCRIPTIONS_PATH;
use crate::domain::{HubMode, Message, NotificationContent};
use crate::hub::{PublishNewMessage, ReceiveMessage, SubscriptionLifecycle};
use crate::repos::MessageStore;
use crate::transport::message::{
    ErrorBody, MessageQuery, ServiceInfo, StatusBody, SubscriptionForm,
};
use crate::utils::error::{HubError, RepoError};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service_name: String,
    pub jurisdiction: String,
    pub default_lease_seconds: u64,
    pub messages: Arc<dyn MessageStore>,
    pub receive: Arc<ReceiveMessage>,
    pub publish: Arc<PublishNewMessage>,
    pub subscriptions: Arc<SubscriptionLifecycle>,
}

impl ApiState {
    pub fn from_app(app: &App) -> Self {
        Self {
            service_name: app.settings.service.name.clone(),
            jurisdiction: app.settings.service.jurisdiction.clone(),
            default_lease_seconds: app.settings.subscription.default_lease_seconds,
            messages: app.messages.clone(),
            receive: Arc::new(app.receive_message()),
            publish: Arc::new(app.publish_new_message()),
            subscriptions: Arc::new(app.subscription_lifecycle()),
        }
    }
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            ApiError::Hub(HubError::IntentVerificationFailed { .. }) => (
                StatusCode::BAD_REQUEST,
                "Intent verification failed".to_string(),
            ),
            ApiError::Hub(HubError::SubscriptionNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Subscription not found".to_string())
            }
            ApiError::Hub(err @ HubError::InvalidTopic { .. }) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Repo(err) => {
                error!(error = %err, "Store request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Hub(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/messages", post(post_message))
        .route("/messages/incoming", post(incoming_message))
        .route("/messages/{id}", get(get_message))
        .route(SUBSCRIPTIONS_PATH, post(subscribe_by_jurisdiction))
        .with_state(state)
}

/// Binds `addr` and serves the API until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: ApiState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index(State(state): State<ApiState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: state.service_name.clone(),
    })
}

async fn post_message(
    State(state): State<ApiState>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Message>, ApiError> {
    let message = state.receive.receive(Message::new(payload)).await?;
    Ok(Json(message))
}

async fn get_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.fields() != ["status"] {
        return Ok(Json(json!({})));
    }
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(Json(json!({})));
    };

    match state.messages.get_message(&id).await? {
        Some(message) => Ok(Json(json!({ "status": message.status }))),
        None => Ok(Json(json!({}))),
    }
}

async fn incoming_message(
    State(state): State<ApiState>,
    Json(content): Json<NotificationContent>,
) -> Result<Json<StatusBody>, ApiError> {
    debug!(content_id = %content.id, "Received message");
    state.publish.publish(&state.jurisdiction, content).await?;
    Ok(Json(StatusBody {
        status: "delivered".to_string(),
    }))
}

async fn subscribe_by_jurisdiction(
    State(state): State<ApiState>,
    Form(form): Form<SubscriptionForm>,
) -> Result<StatusCode, ApiError> {
    info!(
        callback = %form.callback,
        topic = %form.topic,
        mode = form.mode.as_str(),
        "Subscription request received"
    );
    validate_callback(&form.callback)?;

    let topic = format!("jurisdiction.{}", form.topic);
    let outcome = match form.mode {
        HubMode::Subscribe => {
            let lease = form.lease_seconds.unwrap_or(state.default_lease_seconds);
            state
                .subscriptions
                .register(&form.callback, &topic, Some(lease))
                .await
                .map(|_| ())
        }
        HubMode::Unsubscribe => state.subscriptions.deregister(&form.callback, &topic).await,
    };

    if let Err(HubError::IntentVerificationFailed { callback }) = &outcome {
        warn!(%callback, "Intent verification failed");
    }
    outcome?;
    Ok(StatusCode::ACCEPTED)
}

fn validate_callback(callback: &str) -> Result<(), ApiError> {
    let url = reqwest::Url::parse(callback)
        .map_err(|e| ApiError::Validation(format!("invalid hub.callback: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ApiError::Validation(format!(
            "unsupported hub.callback scheme: {scheme}"
        ))),
    }
}
