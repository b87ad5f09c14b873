pub mod db;
pub mod extract;
pub mod import;
pub mod models;
pub mod resolve;
pub mod service;
