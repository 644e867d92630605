pub mod colour;
pub mod models;
pub mod settings;
