//! Client for a Discord-compatible REST API (v10).
//!
//! Implements every platform capability the watchlist needs:
//! - category and channel management with permission overwrites
//! - moderator role discovery (roles holding MANAGE_MESSAGES)
//! - identity-preserving relay through a per-channel webhook
//! - moderator alerts posted into the audit channel

pub mod client;
pub mod wire;

pub use client::{DiscordClient, DiscordConfig};
