//! # auth-adapters
//!
//! Implementations of the `AuthProvider` and `SessionResolver` ports.

pub mod channel;
pub mod static_tokens;

#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use channel::ChannelAuthProvider;
pub use static_tokens::StaticTokenResolver;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtSessionResolver;
