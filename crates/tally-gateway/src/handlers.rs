// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Bodies are taken as raw bytes and decoded only after the owning scope
//! has been found, so an unknown token answers 404 even when the body is
//! malformed.

use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tally_core::types::{Application, Chat, HealthStatus, Message};
use tally_core::{SequenceNumber, TallyError};
use tally_sequencer::{Completion, Issued};

use crate::error::ApiError;
use crate::server::GatewayState;

// --- Request bodies ---

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationRequest {
    #[serde(default)]
    pub application: Option<ApplicationParams>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationParams {
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of chat creation. Carries no fields.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {}

#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: Option<MessageParams>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

// --- Response bodies ---

#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub name: String,
    pub token: String,
    pub chats_count: i64,
}

impl From<Application> for ApplicationView {
    fn from(a: Application) -> Self {
        Self {
            name: a.name,
            token: a.token,
            chats_count: a.chats_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub number: SequenceNumber,
    pub messages_count: i64,
}

impl From<Chat> for ChatView {
    fn from(c: Chat) -> Self {
        Self {
            number: c.number,
            messages_count: c.messages_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub number: SequenceNumber,
    pub body: String,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            number: m.number,
            body: m.body,
        }
    }
}

/// Response to chat and message creation.
#[derive(Debug, Serialize)]
pub struct IssuedResponse {
    pub number: SequenceNumber,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, String>,
}

// --- Helpers ---

/// Decode a JSON body. An empty body decodes as the default value.
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

fn parse_number(raw: &str, message: &str) -> Result<SequenceNumber, ApiError> {
    raw.parse::<SequenceNumber>()
        .map_err(|_| ApiError::bad_request(message))
}

async fn resolve_chat(
    state: &GatewayState,
    token: &str,
    chat_number: &str,
) -> Result<Chat, ApiError> {
    let number = parse_number(chat_number, "Invalid chat number")?;
    Ok(state.sequencer.find_chat(token, number).await?)
}

fn issued(issued: Issued, persisted: &'static str, dispatched: &'static str) -> Response {
    let (status, text) = match issued.completion {
        Completion::Persisted { .. } => (StatusCode::CREATED, persisted),
        Completion::Dispatched { .. } => (StatusCode::ACCEPTED, dispatched),
    };
    (
        status,
        Json(IssuedResponse {
            number: issued.number,
            status: text,
        }),
    )
        .into_response()
}

// --- Applications ---

/// GET /applications
pub async fn list_applications(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<ApplicationView>>, ApiError> {
    let applications = state.sequencer.list_applications().await?;
    Ok(Json(applications.into_iter().map(Into::into).collect()))
}

/// POST /applications
pub async fn create_application(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApplicationView>), ApiError> {
    let request: ApplicationRequest = decode(&body)?;
    let name = request.application.and_then(|a| a.name);
    let application = state.sequencer.create_application(name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(application.into())))
}

/// GET /applications/{token}
pub async fn show_application(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
) -> Result<Json<ApplicationView>, ApiError> {
    let application = state.sequencer.find_application(&token).await?;
    Ok(Json(application.into()))
}

/// PUT|PATCH /applications/{token}
pub async fn update_application(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Json<ApplicationView>, ApiError> {
    let application = state.sequencer.find_application(&token).await?;
    let request: ApplicationRequest = decode(&body)?;
    let name = request.application.and_then(|a| a.name);
    let renamed = state
        .sequencer
        .rename_application(&application, name.as_deref())
        .await?;
    Ok(Json(renamed.into()))
}

// --- Chats ---

/// GET /applications/{token}/chats
pub async fn list_chats(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    let application = state.sequencer.find_application(&token).await?;
    let chats = state.sequencer.list_chats(&application).await?;
    Ok(Json(chats.into_iter().map(Into::into).collect()))
}

/// POST /applications/{token}/chats
pub async fn create_chat(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let application = state.sequencer.find_application(&token).await?;
    let _: ChatRequest = decode(&body)?;
    let outcome = state.sequencer.create_chat(&application).await?;
    Ok(issued(outcome, "Chat created", "Chat is being processed"))
}

/// GET /applications/{token}/chats/{number}
pub async fn show_chat(
    State(state): State<GatewayState>,
    Path((token, number)): Path<(String, String)>,
) -> Result<Json<ChatView>, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    Ok(Json(chat.into()))
}

// --- Messages ---

/// GET /applications/{token}/chats/{number}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path((token, number)): Path<(String, String)>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    let messages = state.sequencer.list_messages(&chat).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// POST /applications/{token}/chats/{number}/messages
pub async fn create_message(
    State(state): State<GatewayState>,
    Path((token, number)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    let request: MessageRequest = decode(&body)?;
    let text = request.message.and_then(|m| m.body);
    let outcome = state.sequencer.create_message(&chat, text.as_deref()).await?;
    Ok(issued(outcome, "Message created", "Message is being processed"))
}

/// GET /applications/{token}/chats/{number}/messages/search?query=text
pub async fn search_messages(
    State(state): State<GatewayState>,
    Path((token, number)): Path<(String, String)>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    let messages = state
        .sequencer
        .search_messages(&chat, params.query.as_deref())
        .await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// GET /applications/{token}/chats/{number}/messages/{message}
pub async fn show_message(
    State(state): State<GatewayState>,
    Path((token, number, message)): Path<(String, String, String)>,
) -> Result<Json<MessageView>, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    let message_number = parse_number(&message, "Invalid message number")?;
    match state.sequencer.find_message(&chat, message_number).await {
        Ok(message) => Ok(Json(message.into())),
        Err(TallyError::NotFound { .. }) => Err(ApiError::not_found(
            "Message not found or still being processed",
        )),
        Err(e) => Err(e.into()),
    }
}

/// PUT|PATCH /applications/{token}/chats/{number}/messages/{message}
pub async fn update_message(
    State(state): State<GatewayState>,
    Path((token, number, message)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<MessageView>, ApiError> {
    let chat = resolve_chat(&state, &token, &number).await?;
    let message_number = parse_number(&message, "Invalid message number")?;
    let request: MessageRequest = decode(&body)?;
    let text = request.message.and_then(|m| m.body);
    let updated = state
        .sequencer
        .update_message(&chat, message_number, text.as_deref())
        .await?;
    Ok(Json(updated.into()))
}

// --- Operations ---

/// GET /up
///
/// 200 when both stores answer their health checks, 503 otherwise.
pub async fn up(State(state): State<GatewayState>) -> Response {
    let report = state.sequencer.health().await;
    if !report
        .iter()
        .any(|(_, status)| matches!(status, HealthStatus::Unhealthy(_)))
    {
        return Json(HealthResponse {
            status: "ok",
            checks: BTreeMap::new(),
        })
        .into_response();
    }

    let checks = report
        .into_iter()
        .map(|(name, status)| {
            let text = match status {
                HealthStatus::Healthy => "healthy".to_string(),
                HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
                HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
            };
            (name, text)
        })
        .collect();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unavailable",
            checks,
        }),
    )
        .into_response()
}

/// GET /metrics
pub async fn metrics(State(state): State<GatewayState>) -> Response {
    match &state.metrics {
        Some(render) => (
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError::not_found("Metrics are not enabled").into_response(),
    }
}
