pub mod entity;
pub mod error;
pub mod id;
pub mod lifecycle;
mod macros;
pub mod models;
pub mod tenant;
pub mod time;
pub mod validation;

pub use entity::{Entity, RecordMeta};
pub use error::{CoreError, ErrorCategory, Result};
pub use id::{generate_id, generate_reference};
pub use lifecycle::{Lifecycle, parse_transition};
pub use tenant::{Role, ServiceType};
pub use time::{now_utc, today};
