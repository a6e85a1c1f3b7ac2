use dualrail_core::plan::load_plan;
use dualrail_core::publish::TracingSink;
use dualrail_core::report::{console, json, junit};
use dualrail_core::runner::{run_plan, RunPolicy};
use dualrail_core::sim::SimulatedSupply;

use crate::cli::args::RunArgs;
use crate::exit_codes;

pub fn run(args: RunArgs) -> anyhow::Result<i32> {
    let plan = match load_plan(&args.plan) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(error = %e, "config error");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let mut supply = SimulatedSupply::new().with_timeout_ms(plan.io_timeout_ms);
    for (output, ohms) in &args.loads {
        supply = supply.with_load(*output, *ohms);
    }
    let policy = RunPolicy {
        stop_on_error: plan.stop_on_error || args.stop_on_error,
    };

    let artifacts = run_plan(&plan, &mut supply, &mut TracingSink, &policy);

    console::print_summary(&artifacts);
    if let Some(path) = &args.junit {
        junit::write_junit(&artifacts, path)?;
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&json::to_json(&artifacts))?);
    }
    if let Some(path) = &args.json_out {
        json::write_json(&artifacts, path)?;
    }

    Ok(if artifacts.verdict.is_success() {
        exit_codes::OK
    } else {
        exit_codes::TEST_FAILED
    })
}
