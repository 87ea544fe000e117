// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use ahash::AHashSet;
use esm_graph::{
    Agent,
    ecmascript::scripts_and_modules::module::module_semantics::{
        abstract_module_records::ModuleRequest, module_unit::ModuleUnit,
        source_text_module_records::SourceTextModule,
    },
};
use oxc_diagnostics::OxcDiagnostic;

/// Exit the program with parse errors.
pub fn exit_with_parse_errors(
    errors: Vec<OxcDiagnostic>,
    source_path: &Path,
    source: String,
) -> ! {
    debug_assert!(!errors.is_empty());

    // This seems to be needed for color and Unicode output.
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(oxc_diagnostics::GraphicalReportHandler::new())
    }));

    eprintln!("Parse errors:");

    let named_source = miette::NamedSource::new(display_path(source_path), source);
    for error in errors {
        let report = error.with_source_code(named_source.clone());
        eprint!("{report:?}");
    }
    eprintln!();

    std::process::exit(1);
}

/// `path` relative to the working directory when it is inside it.
pub fn display_path(path: &Path) -> String {
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf));
    relative
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

pub fn format_request(request: &ModuleRequest) -> String {
    let specifier = request.specifier();
    if request.attributes().is_empty() {
        return format!("'{specifier}'");
    }
    let attributes: Vec<String> = request
        .attributes()
        .iter()
        .map(|attribute| format!("{}: '{}'", attribute.key(), attribute.value()))
        .collect();
    format!("'{specifier}' with {{ {} }}", attributes.join(", "))
}

/// One line per request, import, export and declaration of `unit`.
pub fn describe_unit(unit: &ModuleUnit) -> Vec<String> {
    let mut lines = Vec::new();
    for request in unit.requested_modules() {
        lines.push(format!("request {}", format_request(request)));
    }
    for entry in unit.import_entries() {
        let from = format_request(entry.module_request());
        lines.push(match entry.import_name() {
            Some(name) if name == entry.local_name() => format!("import {{ {name} }} from {from}"),
            Some(name) => format!("import {{ {name} as {} }} from {from}", entry.local_name()),
            None => format!("import * as {} from {from}", entry.local_name()),
        });
    }
    for entry in unit.local_export_entries() {
        lines.push(format!(
            "export {} as {}",
            entry.local_name(),
            entry.export_name()
        ));
    }
    for entry in unit.indirect_export_entries() {
        let from = format_request(entry.module_request());
        lines.push(match entry.import_name() {
            Some(name) => format!("export {{ {name} as {} }} from {from}", entry.export_name()),
            None => format!("export * as {} from {from}", entry.export_name()),
        });
    }
    for request in unit.star_export_entries() {
        lines.push(format!("export * from {}", format_request(request)));
    }
    for declaration in unit.declarations() {
        lines.push(format!(
            "{} {}",
            declaration.kind().as_str(),
            declaration.name()
        ));
    }
    if unit.has_top_level_await() {
        lines.push("top-level await".to_string());
    }
    lines
}

/// The source text modules reachable from `entry`, in depth-first preorder.
pub fn reachable_modules(agent: &Agent, entry: SourceTextModule) -> Vec<SourceTextModule> {
    let mut seen = AHashSet::default();
    let mut order = Vec::new();
    let mut stack = vec![entry];
    while let Some(module) = stack.pop() {
        if !seen.insert(module) {
            continue;
        }
        order.push(module);
        // Pushed in reverse so that requests are visited in source order.
        for request in module.requested_modules(agent).iter().rev() {
            let dependency = module
                .loaded_module(agent, request)
                .and_then(|dependency| dependency.as_source_text());
            if let Some(dependency) = dependency {
                stack.push(dependency);
            }
        }
    }
    order
}

/// Canonical paths of the files given with `--reject`.
pub fn rejected_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|path| std::fs::canonicalize(path).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use esm_graph::ecmascript::scripts_and_modules::module::module_semantics::module_unit::parse_module_unit;

    use super::*;

    #[test]
    fn describes_every_kind_of_entry() {
        let unit = parse_module_unit(
            "import { a, b as c } from './dep.mjs';\n\
             import * as ns from './ns.mjs';\n\
             export { a as d };\n\
             export * from './star.mjs';\n\
             export * as inner from './ns.mjs';\n\
             export let e;\n\
             await 0;",
        )
        .unwrap();
        let lines = describe_unit(&unit);
        for expected in [
            "request './dep.mjs'",
            "import { a } from './dep.mjs'",
            "import { b as c } from './dep.mjs'",
            "import * as ns from './ns.mjs'",
            "export * from './star.mjs'",
            "export * as inner from './ns.mjs'",
            "export e as e",
            "let e",
            "top-level await",
        ] {
            assert!(lines.iter().any(|line| line == expected), "{expected}: {lines:#?}");
        }
    }

    #[test]
    fn formats_request_attributes() {
        let request = ModuleRequest::with_attributes("./data.json", [("type", "json")]);
        assert_eq!(format_request(&request), "'./data.json' with { type: 'json' }");
    }
}
