pub mod logger;
pub mod mixed;
pub mod traits;
pub mod config;
pub mod chat_filter;
pub mod member_locks;
pub mod escalation;
pub mod auto_moder;
pub mod sweeper;
pub mod resolver;
pub mod threads;
#[cfg(feature = "db_interface")]
pub mod console;
#[cfg(test)]
pub mod testing;

pub use logger::Logger;
pub use traits::*;
pub use config::Config;
pub use chat_filter::ChatFilter;
pub use member_locks::MemberLocks;
pub use auto_moder::AutoModerator;
pub use sweeper::Sweeper;
pub use resolver::{incoming_message, Resolver};
pub use threads::periodic_sweeps;
