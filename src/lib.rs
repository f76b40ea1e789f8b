//! Coldwatch - cold-storage temperature monitoring over a hosted Supabase backend
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod routes;
pub mod services;
pub mod supabase;
pub mod sync;
