//! Hardware abstraction traits for the potty tracker connectivity layer
//!
//! This crate defines the seams between the platform-agnostic logic in
//! `potty-core` and a board support package. BSPs implement these traits.
//!
//! - **`link`**: `NetworkLink`, association and link-status polling
//! - **`clock`**: `WallClock`, network-synchronized calendar time
//! - **`http`**: `HttpClient`, single-shot HTTPS requests

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod http;
pub mod link;

pub use clock::WallClock;
pub use http::{HttpClient, Method, Request, Response};
pub use link::NetworkLink;
