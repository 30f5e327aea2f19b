//! User accounts.

mod models;
mod repository;
mod service;

pub use models::{CreateUserRequest, User, UserInfo};
pub use repository::UserRepository;
pub use service::{UserService, hash_password};
