//! Core domain models.
//!
//! This module contains the library records, the model catalogue, result
//! payloads and user rows shared by every layer of the service.

pub mod models;
pub mod results;
pub mod search;
pub mod user;

pub use models::*;
pub use results::*;
pub use search::*;
pub use user::*;
