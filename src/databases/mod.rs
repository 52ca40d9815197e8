pub mod database;
pub mod records;
pub mod wrappers;

pub use database::Database;
pub use records::*;
pub use wrappers::{ConfigDB, MembersDB, WarningsDB};
