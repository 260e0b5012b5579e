// User lifecycle module
// Role-gated create/read/update/delete of users, each with one stored image

pub mod age;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use error::UserError;
pub use models::{FileRecord, RequestOrigin, User, UserForm, UserView};
pub use repository::{FileRepository, PgFileRepository, PgUserRepository, UserRepository};
pub use service::UserService;
