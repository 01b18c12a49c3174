pub mod manager;
pub mod models;
pub mod repository;
pub mod reviews;
pub mod tours;
pub mod users;
