//! External collaborator traits.

mod cursor_store;
mod featured;
mod interaction_log;
mod remote;
mod viewed;

pub use cursor_store::CursorStore;
pub use featured::FeaturedState;
pub use interaction_log::InteractionLog;
pub use remote::{HistoryPage, RemoteHistory, RemoteStore};
pub use viewed::ViewedStateProvider;
