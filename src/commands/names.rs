use anyhow::Result;

use crate::Context;
use crate::stacks::{self, StackTemplate};
use crate::ui;

pub fn run(ctx: &Context, template: Option<StackTemplate>) -> Result<()> {
    let (config, template) = super::load(ctx, template)?;
    let names = stacks::planned_names(template, &config)?;

    if !ctx.quiet {
        ui::header(&format!("Names for the {template} stack"));
    }
    for (kind, name) in &names {
        if ctx.quiet {
            println!("{name}");
        } else {
            ui::kv(&format!("{:<5}", kind.tag()), name);
        }
    }
    if !ctx.quiet {
        ui::dim("Resources declared per list item are named once the list resolves");
    }
    Ok(())
}
