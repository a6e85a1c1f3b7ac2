use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dualrail",
    version,
    about = "Run SCPI test plans against dual-output DC power supplies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a plan against the simulated supply
    Run(RunArgs),
    /// Load and validate a plan without running it
    Validate(ValidateArgs),
    /// List the step catalog
    Nodes(NodesArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "plan.yaml")]
    pub plan: PathBuf,

    /// Write a JUnit XML report to this path
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// Print the JSON report on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to this path
    #[arg(long)]
    pub json_out: Option<PathBuf>,

    /// Skip remaining steps after the first fail or error
    #[arg(long)]
    pub stop_on_error: bool,

    /// Resistive load on a simulated output, as OUTPUT=OHMS (e.g. 2=4.7)
    #[arg(long = "load", value_parser = parse_load)]
    pub loads: Vec<(usize, f64)>,
}

#[derive(Parser, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "plan.yaml")]
    pub plan: PathBuf,
}

#[derive(Parser, Clone)]
pub struct NodesArgs {
    /// Only list nodes whose name or header contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

fn parse_load(s: &str) -> Result<(usize, f64), String> {
    let (output, ohms) = s
        .split_once('=')
        .ok_or_else(|| format!("expected OUTPUT=OHMS, got '{s}'"))?;
    let output: usize = output
        .trim()
        .parse()
        .map_err(|_| format!("invalid output '{output}'"))?;
    if !(1..=2).contains(&output) {
        return Err(format!("output must be 1 or 2, got {output}"));
    }
    let ohms: f64 = ohms
        .trim()
        .parse()
        .map_err(|_| format!("invalid resistance '{ohms}'"))?;
    Ok((output, ohms))
}
