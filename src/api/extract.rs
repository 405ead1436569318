use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::error::AppError;

/// JSON body whose rejections render as `{"error": ...}`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Peer address of the connection, when the server was started with connect info
#[derive(Debug, Clone, Copy)]
pub struct SocketIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for SocketIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SocketIp(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}
