use super::args::*;

pub mod nodes;
pub mod run;
pub mod validate;

use crate::exit_codes::OK;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args),
        Command::Validate(args) => validate::run(args),
        Command::Nodes(args) => nodes::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(OK)
        }
    }
}
