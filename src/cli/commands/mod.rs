pub mod admin;
pub mod auth;
pub mod favorites;
pub mod modules;
pub mod pdf;
