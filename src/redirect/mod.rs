pub mod handlers;
pub mod pages;
pub mod routes;

pub use handlers::Resolution;
pub use routes::create_redirect_router;
