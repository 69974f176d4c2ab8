//! Data models.

pub mod article;
pub mod page;
pub mod user;

pub use article::{Article, ArticleFilter, ArticleQuery, ArticleUpdate, NewArticle};
pub use page::{Page, PageQuery, PageRequest};
pub use user::{NewUser, User, UserUpdate};
