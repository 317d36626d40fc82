// src/handlers/mod.rs

pub mod answers;
pub mod assignments;
pub mod questions;
pub mod submissions;
pub mod users;
