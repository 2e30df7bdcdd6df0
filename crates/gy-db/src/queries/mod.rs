//! Query operations, grouped per entity.

pub mod accounts;
pub mod albums;
pub mod attachments;
pub mod broadcasts;
pub mod notes;
pub mod settings;
pub mod subjects;
pub mod users;
