// ABOUTME: Session module — conversation store and on-disk persistence.
// ABOUTME: Owns message ordering and the in-flight turn contract.

pub mod persistence;
pub mod store;

pub use store::{
    derive_title, Message, Role, Session, SessionStore, NEW_CHAT_TITLE, STREAM_FAILURE_NOTICE,
};
