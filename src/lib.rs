//! Social Core Library
//!
//! Core functionality for the social site: profiles and the friendship
//! graph between them. Page handlers, templating and authentication live
//! outside this crate and drive it through [`friendship::ProfileDirectory`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod friendship;

pub use friendship::{FriendshipError, ProfileDirectory};
