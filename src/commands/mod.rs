pub mod deploy;
pub mod names;

use anyhow::Result;

use crate::Context;
use crate::config::StackConfig;
use crate::stacks::StackTemplate;

/// Load the stack config and pick the template
fn load(ctx: &Context, template: Option<StackTemplate>) -> Result<(StackConfig, StackTemplate)> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    let template = template.unwrap_or(config.template);
    log::debug!("Using template {template}");
    Ok((config, template))
}
