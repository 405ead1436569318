//! HTML pages served on the redirect path

use askama::Template;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

#[derive(Template)]
#[template(path = "interstitial.html")]
struct InterstitialPage<'a> {
    title: &'a str,
    description: &'a str,
    /// Pre-escaped for attribute and text context
    url_attr: String,
    delay: i64,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    status: u16,
    heading: &'a str,
    message: &'a str,
}

/// Askama's default escaper also encodes `/`, which would garble the
/// destination shown to the visitor; quotes and markup are all that matter here.
fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn no_store(status: StatusCode, body: String) -> Response {
    let mut response = (status, Html(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn interstitial(title: &str, description: &str, url: &str, delay: i64) -> Response {
    let page = InterstitialPage {
        title,
        description,
        url_attr: escape_attr(url),
        delay,
    };
    match page.render() {
        Ok(body) => no_store(StatusCode::OK, body),
        Err(e) => {
            error!("Failed to render interstitial page: {}", e);
            error_page(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn error_page(status: StatusCode) -> Response {
    let (heading, message) = match status {
        StatusCode::NOT_FOUND => (
            "Link not found",
            "This short link does not exist or has been removed.",
        ),
        StatusCode::GONE => ("Link expired", "This short link has expired."),
        StatusCode::FORBIDDEN => ("Link disabled", "This short link has been disabled."),
        _ => (
            "Something went wrong",
            "The link could not be opened. Please try again later.",
        ),
    };

    let page = ErrorPage {
        status: status.as_u16(),
        heading,
        message,
    };
    let body = page.render().unwrap_or_else(|e| {
        error!("Failed to render error page: {}", e);
        format!("{} {}", status.as_u16(), heading)
    });
    no_store(status, body)
}
