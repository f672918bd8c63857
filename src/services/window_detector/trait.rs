use crate::config::Config;
use crate::services::{SystemToolRunner, ToolRunner};
use std::sync::Arc;

/// Factory function to create an appropriate tool runner based on the dry_run flag
pub fn create_tool_runner(config: &Config, dry_run: bool) -> Arc<dyn ToolRunner> {
    if dry_run {
        Arc::new(super::dry_run::DryRunRunner::new())
    } else {
        Arc::new(SystemToolRunner::new(config.tool_timeout()))
    }
}
