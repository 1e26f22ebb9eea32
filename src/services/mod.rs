//! Clinic domain services used by the HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers
//! stay focused on request decoding, auth guards and status mapping.
//! Anything that changes shared state publishes an `<entity>:changed` frame
//! through `hub` after its transaction commits.

pub mod appointment;
pub mod auth;
pub mod billing;
pub mod cart;
pub mod chat;
pub mod consultation;
pub mod dosage;
pub mod holiday;
pub mod hub;
pub mod inventory;
pub mod mail;
pub mod orders;
pub mod patient;
pub mod reports;
pub mod session;
pub mod settings;
pub mod slots;
pub mod staff;
