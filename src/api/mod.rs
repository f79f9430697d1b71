//! Storefront authentication API
//!
//! [`AuthClient`] maps each auth endpoint to a typed call; [`AuthError`] is
//! the closed set of failures those calls can produce.

mod client;
mod error;

pub use client::{
    AuthClient, Endpoints, ProfileImage, ProfileUpdate, SignupRequest, TokenRefresher, UserProfile,
};
pub use error::{AuthError, Operation};
