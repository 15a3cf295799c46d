//! Voice Lecturer Server library.
//!
//! Backend for generating voice-cloned talking-head lecture videos:
//! database operations, authentication, asset storage, hosted AI service
//! clients, and the in-process job pipeline.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
