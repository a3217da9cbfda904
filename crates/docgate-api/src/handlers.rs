//! Request handlers.

pub mod health;
pub mod quota;
pub mod registration;
pub mod reputation;
pub mod users;

pub use health::*;
pub use quota::*;
pub use registration::*;
pub use reputation::*;
pub use users::*;
