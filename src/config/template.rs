// src/config/template.rs

//! Starter configuration for a catalog (`--init-config`).

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::catalog::pattern::{UNIT_META_PREFIX, UNIT_PLACEHOLDER};
use crate::catalog::{Catalog, RuleAction, NODE_PLACEHOLDERS};

const BUILTIN_VARS: &[&str] = &["working_dir", "output_dir", "log_dir", "config_file", "rule"];

/// Placeholders the catalog expects `[params]` to supply.
pub fn required_params(catalog: &Catalog) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for rule in catalog.rules() {
        let cmd = match &rule.action {
            RuleAction::Command(cmd) => Some(cmd),
            RuleAction::Passthrough => None,
        };
        let patterns = rule
            .inputs
            .iter()
            .map(|i| &i.pattern)
            .chain(rule.sources.iter())
            .chain(rule.output.iter())
            .chain([&rule.marker, &rule.log])
            .chain(cmd);
        for pattern in patterns {
            for name in pattern.placeholders() {
                let builtin = name == UNIT_PLACEHOLDER
                    || name.starts_with(UNIT_META_PREFIX)
                    || BUILTIN_VARS.contains(&name)
                    || NODE_PLACEHOLDERS.contains(&name);
                if !builtin {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names
}

/// Render a commented config file listing every switch and required param.
pub fn render_template(catalog: &Catalog) -> String {
    let mut out = String::new();

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "# catalog = \"catalog.toml\"   # omit to use the built-in catalog");
    let _ = writeln!(out);
    let _ = writeln!(out, "[env]");
    let _ = writeln!(out, "working_dir = \"work\"");
    let _ = writeln!(out, "# output_dir = \"work/output\"");
    let _ = writeln!(out, "# log_dir = \"work/logs\"");
    let _ = writeln!(out, "max_concurrency = 1");
    let _ = writeln!(out, "failure_policy = \"keep_going\"   # or \"stop_dispatch\"");

    let _ = writeln!(out);
    let _ = writeln!(out, "[switches]");
    for switch in catalog.switches() {
        if let Some(desc) = &switch.description {
            let _ = writeln!(out, "# {desc}");
        }
        let _ = writeln!(out, "{} = {}", switch.name, switch.default);
    }
    for group in catalog.exclusive_groups() {
        let _ = writeln!(
            out,
            "# at most one of: {}",
            group.switches.join(", ")
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[params]");
    for name in required_params(catalog) {
        let _ = writeln!(out, "{name} = \"\"");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[units]");
    let _ = writeln!(out, "# \"0\" = {{ time = \"2021-05-04T10:00:00\" }}");

    out
}
