pub mod accounts;
pub mod listings;
pub mod subscriptions;

pub use accounts::*;
pub use listings::*;
pub use subscriptions::*;
