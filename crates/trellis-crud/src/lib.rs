//! trellis-crud - user CRUD command set for the Trellis gateway
//!
//! This crate provides:
//! - `CrudApi`, the generic call boundary to the backing basicCrud service
//! - `HttpCrudClient`, its reqwest implementation
//! - The five proxied commands and their registration helper

pub mod client;
pub mod commands;

pub use client::{CrudApi, CrudError, CrudResponse, HttpCrudClient, DEFAULT_CRUD_API_URL};
pub use commands::register_commands;
