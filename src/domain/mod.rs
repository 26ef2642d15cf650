pub mod access;
pub mod filter;
pub mod listing;
pub mod plan;
pub mod quota;
pub mod subscription;
pub mod user;

pub use access::*;
pub use filter::*;
pub use listing::*;
pub use plan::*;
pub use quota::*;
pub use subscription::*;
pub use user::*;
