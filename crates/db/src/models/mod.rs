//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod campaign;
pub mod customer;
pub mod insurance;
pub mod notification_log;
pub mod quotation;
pub mod setting;
pub mod template;
