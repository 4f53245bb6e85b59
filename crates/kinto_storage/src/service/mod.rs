//! Use-case services over record storage.
//!
//! # Responsibility
//! - Bind storage calls to one namespace so callers stop repeating it.
//! - Keep resource layers decoupled from the storage backend.

pub mod collection_service;
