use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::extract_client_ip;
use crate::api::extract::{ApiJson, SocketIp};
use crate::app::AppState;
use crate::auth::{AdminIdentity, ChangePasswordRequest, LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::models::{CreateLinkRequest, Link, LinkPage, LinkView, UpdateLinkRequest};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Raw query values; anything unparsable falls back to the default
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|&p| p >= 1)
            .unwrap_or(1)
    }

    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|&l| l >= 1)
            .map_or(DEFAULT_PAGE_SIZE, |l| l.min(MAX_PAGE_SIZE))
    }
}

fn view(state: &AppState, short_code: String, link: Link) -> LinkView {
    LinkView {
        short_url: Some(state.short_url(&short_code)),
        short_code,
        link,
    }
}

/// Exchange credentials for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    SocketIp(socket_ip): SocketIp,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let client_ip = extract_client_ip(&headers, socket_ip, state.trusted_proxy_mode);
    let response = state.auth.login(payload, Some(&client_ip)).await?;
    Ok(Json(response))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.auth.change_password(&admin.username, payload).await?;
    Ok(SuccessResponse::new("password changed"))
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<LinkPage>, AppError> {
    let mut page = state.links.list(query.page(), query.limit()).await?;
    for link in &mut page.links {
        link.short_url = Some(state.short_url(&link.short_code));
    }
    Ok(Json(page))
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    ApiJson(payload): ApiJson<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkView>), AppError> {
    let (code, link) = state.links.create_link(payload, &admin.username).await?;
    Ok((StatusCode::CREATED, Json(view(&state, code, link))))
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<LinkView>, AppError> {
    let link = state.links.get(&code).await?.ok_or(AppError::NotFound)?;
    Ok(Json(view(&state, code, link)))
}

/// Partial update; absent fields keep their stored values
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(code): Path<String>,
    ApiJson(payload): ApiJson<UpdateLinkRequest>,
) -> Result<Json<LinkView>, AppError> {
    let link = state
        .links
        .update_link(&code, payload, &admin.username)
        .await?;
    Ok(Json(view(&state, code, link)))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.links.delete_link(&code).await?;
    Ok(SuccessResponse::new("short link deleted"))
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn api_not_found() -> AppError {
    AppError::RouteNotFound
}
