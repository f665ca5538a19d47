//! Command implementations for market-cli

pub mod install;
pub mod list;
pub mod outdated;
pub mod tree;
pub mod uninstall;

pub use install::{handle_install, handle_update};
pub use list::{handle_list, handle_set_enabled};
pub use outdated::handle_outdated;
pub use tree::handle_tree;
pub use uninstall::handle_uninstall;
