use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

use super::pages;
use crate::analytics::ClickContext;
use crate::api::extract::SocketIp;
use crate::app::AppState;
use crate::models::Link;
use crate::now_millis;

/// Terminal state of a redirect request
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    NotFound,
    Expired,
    Disabled,
    Interstitial(Link),
    Direct(Link),
}

impl Resolution {
    /// Expiry is checked before the active flag, so an expired link that
    /// was also disabled reports as expired.
    pub fn of(link: Option<Link>, now_ms: i64) -> Self {
        match link {
            None => Resolution::NotFound,
            Some(link) if link.is_expired(now_ms) => Resolution::Expired,
            Some(link) if !link.active => Resolution::Disabled,
            Some(link) if link.show_interstitial => Resolution::Interstitial(link),
            Some(link) => Resolution::Direct(link),
        }
    }

    /// Whether this outcome counts as a click
    pub fn is_followed(&self) -> bool {
        matches!(self, Resolution::Interstitial(_) | Resolution::Direct(_))
    }
}

/// Countdown actually shown: stored 0 means the configured default,
/// negative values navigate immediately.
pub fn effective_delay(stored: i64, default_delay: i64) -> i64 {
    let delay = if stored == 0 { default_delay } else { stored };
    delay.max(0)
}

pub async fn follow_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    SocketIp(socket_ip): SocketIp,
    headers: HeaderMap,
) -> Response {
    dispatch(&state, code, socket_ip, &headers).await
}

/// `/s/{code}/anything`: trailing segments are ignored
pub async fn follow_link_nested(
    State(state): State<Arc<AppState>>,
    Path((code, _rest)): Path<(String, String)>,
    SocketIp(socket_ip): SocketIp,
    headers: HeaderMap,
) -> Response {
    dispatch(&state, code, socket_ip, &headers).await
}

async fn dispatch(
    state: &AppState,
    code: String,
    socket_ip: Option<std::net::IpAddr>,
    headers: &HeaderMap,
) -> Response {
    let link = match state.links.get(&code).await {
        Ok(link) => link,
        Err(e) => {
            error!("Failed to look up short link '{}': {:#}", code, e);
            return pages::error_page(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let resolution = Resolution::of(link, now_millis());
    debug!(short_code = %code, ?resolution, "resolved short link");

    if resolution.is_followed() {
        let context = ClickContext::from_request(
            headers,
            socket_ip,
            state.trusted_proxy_mode,
            state.geoip.as_ref(),
        );
        state.recorder.dispatch(code, context);
    }

    match resolution {
        Resolution::NotFound => pages::error_page(StatusCode::NOT_FOUND),
        Resolution::Expired => pages::error_page(StatusCode::GONE),
        Resolution::Disabled => pages::error_page(StatusCode::FORBIDDEN),
        Resolution::Interstitial(link) => pages::interstitial(
            &link.title,
            &link.description,
            &link.url,
            effective_delay(link.delay, state.links.default_delay_secs()),
        ),
        Resolution::Direct(link) => redirect_to(&link.url),
    }
}

/// 302 with `Location`, percent-encoding the target if it is not a valid header as stored
fn redirect_to(target: &str) -> Response {
    let location = HeaderValue::from_str(target).ok().or_else(|| {
        let normalized = Url::parse(target).ok()?;
        HeaderValue::from_str(normalized.as_str()).ok()
    });

    match location {
        Some(location) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, location),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            ],
        )
            .into_response(),
        None => {
            error!("Stored destination is not a usable Location header");
            pages::error_page(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
