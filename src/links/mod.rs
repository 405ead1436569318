pub mod repository;
pub mod shortcode;

pub use repository::LinkRepository;
