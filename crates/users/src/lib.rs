//! `gatehouse-users` — the users table and its service.

pub mod model;
pub mod service;

pub use model::USERS;
pub use service::UsersService;
