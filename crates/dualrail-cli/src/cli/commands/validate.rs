use dualrail_core::plan::load_plan;

use crate::cli::args::ValidateArgs;
use crate::exit_codes;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let plan = match load_plan(&args.plan) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(error = %e, "config error");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    println!("plan '{}': {} steps", plan.name, plan.steps.len());
    for step in &plan.steps {
        let line = step.line()?;
        println!("  {:<28} {}", step.name, line);
    }
    Ok(exit_codes::OK)
}
