use anyhow::{Context, Result};
use selfup_updater::InstallContext;

use crate::commands::Command;

/// `selfup version`
pub struct VersionCommand;

impl Command for VersionCommand {
    fn name(&self) -> &'static str {
        "version"
    }

    fn about(&self) -> &'static str {
        "Print the running version and where it is installed"
    }

    fn execute(&self) -> Result<i32> {
        let context =
            InstallContext::current().context("failed to locate the running executable")?;
        println!("selfup {}", env!("CARGO_PKG_VERSION"));
        if context.is_packaged() {
            println!("{}", context.executable_path().display());
        } else {
            println!("{} (development build)", context.executable_path().display());
        }
        Ok(0)
    }
}
