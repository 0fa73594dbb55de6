#[macro_use]
extern crate diesel;

pub mod db;
pub mod directory;
pub mod email;
pub mod messages;
pub mod models;
pub mod otp;
pub mod schema;
pub mod store;
pub mod threadrand;
pub mod validators;
