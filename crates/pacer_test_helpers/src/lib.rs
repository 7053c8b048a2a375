//! Shared test utilities for PACER test suites
//!
//! # Modules
//!
//! - [`workspace`]: Temp workspaces with a `.pacer` directory and seeded queues
//! - [`cli`]: Command builders with pre-configured environments
//! - [`logging`]: Test logging configuration
//! - [`assertions`]: Domain-specific assertion helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use pacer_test_helpers::prelude::*;
//!
//! let workspace = init_workspace();
//! pacer_command()
//!     .current_dir(workspace.path())
//!     .arg("list")
//!     .assert()
//!     .success();
//! ```

pub mod assertions;
pub mod cli;
pub mod logging;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::cli::{command_for, pacer_command};
    pub use crate::logging::{init_sync_test_logging, init_test_logging};
    pub use crate::workspace::{init_workspace, temp_dir, workspace_with_queue, workspace_with_config};
}
