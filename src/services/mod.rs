pub mod change_bus;
pub mod clef;
pub mod file_reader;
pub mod file_watcher;
pub mod filter;
pub mod query;
pub mod session;

pub use change_bus::{ChangeBus, FileChangeEvent};
pub use file_watcher::DirectoryWatcher;
pub use filter::{BuiltInNameResolver, EventPredicate, LogSessionFilterFactory, NameResolver};
pub use session::{LogSession, LogSessionProvider};
