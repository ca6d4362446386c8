//! Conversation resolution and thread ordering for 1:1 direct messages.
//!
//! The services here are generic over a storage engine implementing the
//! contract in [`store`]. `duet-db` provides the SQLite engine; [`memory`]
//! holds an in-process one.

pub mod error;
pub mod key;
pub mod log;
pub mod memory;
pub mod reader;
pub mod resolver;
pub mod store;

pub use error::{DmError, Result};
pub use key::{PairKey, canonical_key};
pub use log::MessageLog;
pub use memory::MemoryStore;
pub use reader::ThreadReader;
pub use resolver::ConversationResolver;
pub use store::{ConversationStore, CursorStore, MessageStore, NewMessage, Store};
