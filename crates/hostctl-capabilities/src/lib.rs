//! Host capabilities for remote control.
//!
//! Provides:
//! - Directory and file operations (`fs`)
//! - File and directory downloads (`transfer`)
//! - Shell command execution (`process`)
//! - In-place directory encryption (`crypto`)
//! - Screenshots and recordings (`screen`)
//! - Command building and process-group execution (`command`)

pub mod command;
pub mod crypto;
pub mod fs;
pub mod process;
pub mod screen;
pub mod shell;
pub mod transfer;

use hostctl_core::{AgentConfig, CapabilitySet};

pub use command::{CommandBuilder, CommandParts, ProcessOutput};
pub use crypto::{CryptoCapability, CryptoOp};
pub use fs::{FsCapability, FsOp};
pub use process::ExecuteCommand;
pub use screen::{ScreenCapability, ScreenOp, ScreenshotBackend};
pub use transfer::{TransferCapability, TransferOp};

/// Every built-in capability, configured from `config`.
#[must_use]
pub fn default_capabilities(config: &AgentConfig) -> CapabilitySet {
    let mut set = CapabilitySet::new();
    for capability in FsCapability::all()
        .into_iter()
        .chain(TransferCapability::all(&config.artifact_dir))
        .chain(CryptoCapability::all())
        .chain(ScreenCapability::all(&config.artifact_dir, &config.screen))
    {
        set.register(capability);
    }
    set.with(std::sync::Arc::new(ExecuteCommand))
}
