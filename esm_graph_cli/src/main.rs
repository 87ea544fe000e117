// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
mod error;
mod helper;
mod host;
mod theme;

use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use cliclack::{intro, log, outro, outro_cancel, set_theme};
use error::CliError;
use esm_graph::{
    Agent, Options,
    ecmascript::{
        builtins::promise::PromiseState,
        scripts_and_modules::module::module_semantics::{
            abstract_module_records::ModuleAbstractMethods, get_module_namespace,
            module_unit::parse_module_unit, source_text_module_records::SourceTextModule,
        },
    },
};
use helper::{
    describe_unit, display_path, exit_with_parse_errors, format_request, reachable_modules,
    rejected_paths,
};
use host::{FsHost, LoadError};
use theme::GraphTheme;
use tracing_subscriber::EnvFilter;

/// An ECMAScript module graph linker
#[derive(Debug, ClapParser)] // requires `derive` feature
#[command(name = "esm-graph")]
#[command(about = "Loads, links and evaluates ECMAScript module graphs", long_about = None)]
struct Cli {
    /// Prints module internals and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The maximum depth of the link and evaluate traversals
    #[arg(long, global = true, value_name = "N")]
    max_depth: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parses a file and lists its requests, imports, exports and declarations
    Parse {
        /// The path of the file to parse
        path: PathBuf,
    },

    /// Loads a module graph and lists every module with its requests
    Graph {
        /// The path of the entry module
        entry: String,
    },

    /// Loads and links a module graph, then lists each module's status
    Link {
        /// The path of the entry module
        entry: String,
    },

    /// Loads, links and evaluates a module graph as a dry run
    Run {
        /// The path of the entry module
        entry: String,

        /// Makes the body of this module fail
        #[arg(long, value_name = "PATH")]
        reject: Vec<PathBuf>,
    },

    /// Links a module graph and lists the names of the entry's namespace
    Exports {
        /// The path of the entry module
        entry: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_agent(cli: &Cli, host: &'static FsHost) -> Agent {
    let mut options = Options {
        print_internals: cli.verbose,
        ..Default::default()
    };
    if let Some(max_depth) = cli.max_depth {
        options.max_graph_depth = max_depth;
    }
    Agent::new(options, host)
}

/// Loads the graph of `entry`, running jobs until loading settles.
fn load_graph(agent: &mut Agent, host: &FsHost, entry: &str) -> Result<SourceTextModule, CliError> {
    let module = host.load_entry(agent, entry)?;
    let promise = module.load_requested_modules(agent, None);
    agent.run_jobs();
    match promise.state(agent) {
        PromiseState::Fulfilled(_) => Ok(module),
        PromiseState::Rejected(error) => match host.take_parse_failure() {
            Some(failure) => Err(failure.into()),
            None => Err(CliError::uncaught(agent, error)),
        },
        PromiseState::Pending => Err(CliError::Incomplete("loading")),
    }
}

fn link_graph(agent: &mut Agent, host: &FsHost, entry: &str) -> Result<SourceTextModule, CliError> {
    let module = load_graph(agent, host, entry)?;
    module
        .link(agent)
        .map_err(|error| CliError::uncaught(agent, error))?;
    Ok(module)
}

fn module_name(agent: &Agent, host: &FsHost, module: SourceTextModule) -> String {
    host.path_of(agent, module.into())
        .map(|path| display_path(&path))
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn parse(path: PathBuf) -> Result<(), CliError> {
    let source_text = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;
    let unit = match parse_module_unit(&source_text) {
        Ok(unit) => unit,
        Err(diagnostics) => {
            return Err(LoadError::Parse {
                path,
                source_text,
                diagnostics,
            }
            .into());
        }
    };
    intro(format!("esm-graph parse {}", display_path(&path)))?;
    for line in describe_unit(&unit) {
        log::info(line)?;
    }
    outro(format!("{} requested modules", unit.requested_modules().len()))?;
    Ok(())
}

fn graph(cli: &Cli, entry: &str) -> Result<(), CliError> {
    let host = FsHost::new();
    let mut agent = create_agent(cli, host);
    intro(format!("esm-graph graph {entry}"))?;
    let module = load_graph(&mut agent, host, entry)?;
    let modules = reachable_modules(&agent, module);
    for &module in &modules {
        let mut report = module_name(&agent, host, module);
        if module.has_top_level_await(&agent) {
            report.push_str(" (top-level await)");
        }
        for request in module.requested_modules(&agent) {
            let target = module
                .loaded_module(&agent, request)
                .and_then(|target| host.path_of(&agent, target))
                .map(|path| display_path(&path))
                .unwrap_or_default();
            report.push_str(&format!("\n  {} -> {target}", format_request(request)));
        }
        log::info(report)?;
    }
    outro(format!("{} modules", modules.len()))?;
    Ok(())
}

fn link(cli: &Cli, entry: &str) -> Result<(), CliError> {
    let host = FsHost::new();
    let mut agent = create_agent(cli, host);
    intro(format!("esm-graph link {entry}"))?;
    let module = link_graph(&mut agent, host, entry)?;
    for module in reachable_modules(&agent, module) {
        log::info(format!(
            "{} {}",
            module_name(&agent, host, module),
            module.status(&agent).as_str()
        ))?;
    }
    outro("linked")?;
    Ok(())
}

fn run(cli: &Cli, entry: &str, reject: &[PathBuf]) -> Result<(), CliError> {
    let host = FsHost::rejecting(rejected_paths(reject));
    let mut agent = create_agent(cli, host);
    intro(format!("esm-graph run {entry}"))?;
    let module = link_graph(&mut agent, host, entry)?;
    let promise = module.evaluate(&mut agent);
    agent.run_jobs();
    host.settle_suspended(&mut agent);
    for (position, path) in host.executed().iter().enumerate() {
        log::step(format!("{}. {}", position + 1, display_path(path)))?;
    }
    match promise.state(&agent) {
        PromiseState::Fulfilled(_) => {
            outro("evaluated")?;
            Ok(())
        }
        PromiseState::Rejected(error) => Err(CliError::uncaught(&agent, error)),
        PromiseState::Pending => Err(CliError::Incomplete("evaluation")),
    }
}

fn exports(cli: &Cli, entry: &str) -> Result<(), CliError> {
    let host = FsHost::new();
    let mut agent = create_agent(cli, host);
    intro(format!("esm-graph exports {entry}"))?;
    let module = link_graph(&mut agent, host, entry)?;
    let namespace = get_module_namespace(&mut agent, module.into())
        .map_err(|error| CliError::uncaught(&agent, error))?;
    let names = namespace.exports(&agent);
    for name in names {
        log::info(name)?;
    }
    outro(format!("{} exports", names.len()))?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    set_theme(GraphTheme);

    let result = match &cli.command {
        Command::Parse { path } => parse(path.clone()),
        Command::Graph { entry } => graph(&cli, entry),
        Command::Link { entry } => link(&cli, entry),
        Command::Run { entry, reject } => run(&cli, entry, reject),
        Command::Exports { entry } => exports(&cli, entry),
    };

    match result {
        Ok(()) => Ok(()),
        Err(CliError::Load(LoadError::Parse {
            path,
            source_text,
            diagnostics,
        })) => exit_with_parse_errors(diagnostics, &path, source_text),
        Err(error) => {
            outro_cancel(error.to_string())?;
            std::process::exit(1);
        }
    }
}
