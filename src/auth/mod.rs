//! Authentication context backed by the platform's REST auth API.
//!
//! Tokens are JWTs issued by the server. The client reads the `exp` and
//! `role` claims to learn when the session ends, and exchanges the token
//! for a fresh one through the refresh endpoint.

mod api_client;
pub mod token;

pub use api_client::HttpAuthClient;
pub use token::decode_session;
