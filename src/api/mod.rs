// ABOUTME: HTTP client layer for the Rexec backend API

pub mod client;

pub use client::ApiClient;
