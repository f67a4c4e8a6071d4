//! Domain model (ids, decisions, pagination, errors).

pub mod ids;
pub mod decision;
pub mod pagination;
pub mod errors;

pub use self::ids::UserId;
pub use self::decision::{Decision, Liker, Resolution};
pub use self::pagination::{PageLimit, PageRequest, PageToken};
pub use self::errors::{ApiError, LedgerError, StatusCode, ValidationError};
