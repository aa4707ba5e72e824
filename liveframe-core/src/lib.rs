// src/lib.rs

pub mod config;
pub mod http;
pub mod auth;
pub mod repositories;
pub mod platforms;
pub mod tasks;
pub mod overlay;
pub mod test_utils;

pub use liveframe_common::{models, traits};
pub use liveframe_common::error::Error;
pub use http::{DefaultHttpClient, HttpClient};
