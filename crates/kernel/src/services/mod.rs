//! Business services.
//!
//! Services own the mapping from store failures to response codes.

pub mod article;
pub mod token;
pub mod user;

pub use article::ArticleService;
pub use token::{Claims, TokenAuthenticator, TokenError};
pub use user::UserService;
