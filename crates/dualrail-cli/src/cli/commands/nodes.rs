use dualrail_core::catalog::{self, NodeDescriptor, Slot};

use crate::cli::args::NodesArgs;
use crate::exit_codes;

pub fn run(args: NodesArgs) -> anyhow::Result<i32> {
    let needle = args.filter.as_deref().map(str::to_ascii_lowercase);
    for node in catalog::iter() {
        if let Some(needle) = &needle {
            if !node.name.contains(needle.as_str())
                && !node.header.to_ascii_lowercase().contains(needle.as_str())
            {
                continue;
            }
        }
        println!("{}", describe(node));
    }
    Ok(exit_codes::OK)
}

fn describe(node: &NodeDescriptor) -> String {
    let mut out = format!("{:<52} {}", node.name, node.header);
    if let Some(slots) = node.command {
        out.push_str(&format!("  set[{}]", slots_text(slots)));
    }
    if let Some(query) = node.query {
        out.push_str(&format!("  get[{}] -> {:?}", slots_text(query.params), query.response));
    }
    out
}

fn slots_text(slots: &[Slot]) -> String {
    slots
        .iter()
        .map(|s| {
            if s.optional {
                format!("[{}: {}]", s.name, s.kind)
            } else {
                format!("{}: {}", s.name, s.kind)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
