//! Core identifier types shared across the bot.

pub mod ids;

pub use ids::{CommentId, DeliveryId, PrId, PrNumber, RepoId, Sha};
