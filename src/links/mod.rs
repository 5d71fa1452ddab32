//! Relationship queries between users

pub mod friends;

pub use friends::FriendGraph;
