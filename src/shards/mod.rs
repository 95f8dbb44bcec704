mod tree;
mod watcher;

pub use tree::{Shard, ShardTree, ShardTreeError};
pub use watcher::{ShardProcessor, Watcher};
