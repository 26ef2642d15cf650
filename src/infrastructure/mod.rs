pub mod config;
pub mod media;
pub mod repository;
pub mod session;

pub use config::*;
pub use media::*;
pub use repository::*;
pub use session::*;
