// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host that loads modules from the file system and runs their bodies as
//! a dry run.
//!
//! Every module is identified by its canonical path, which is also stored as
//! the module's host defined value. Bodies execute no code: running one
//! records its path and initializes its declared bindings to undefined.
//! Bodies with top-level await are suspended, and settled in the order they
//! suspended once the job queue is empty.
//!
//! Requests with `with { type: "json" }` load the file as a JSON module: a
//! synthetic module whose `default` export holds the parsed value.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use ahash::{AHashMap, AHashSet};
use esm_graph::ecmascript::{
    builtins::promise::PromiseCapability,
    execution::{Agent, ExceptionType, HostDefined, HostHooks, JsError, JsResult},
    scripts_and_modules::module::{
        Module,
        module_semantics::{
            abstract_module_records::{ModuleLoadPayload, ModuleRequest, Referrer},
            finish_loading_imported_module,
            source_text_module_records::{SourceTextModule, parse_module},
            synthetic_module_records::SyntheticModule,
        },
    },
    types::Value,
};
use oxc_diagnostics::OxcDiagnostic;
use sonic_rs::{JsonType, JsonValueTrait};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Files tried, in order, inside a package directory without a usable
/// `main` entry.
const INDEX_FILES: [&str; 3] = ["index.mjs", "index.js", "index.json"];

/// Extensions appended, in order, to a `main` entry that is not a file.
const MAIN_EXTENSIONS: [&str; 2] = ["js", "json"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot find module '{specifier}'")]
    NotFound { specifier: String },
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{}' contains {} syntax error(s)", path.display(), diagnostics.len())]
    Parse {
        path: PathBuf,
        source_text: String,
        diagnostics: Vec<OxcDiagnostic>,
    },
    #[error("Invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: sonic_rs::Error,
    },
    #[error("Unsupported module specifier '{0}'")]
    UnsupportedSpecifier(String),
    #[error("Unsupported module type '{0}'")]
    UnsupportedModuleType(String),
    #[error("Package '{0}' is not an ES module package, its package.json needs \"type\": \"module\"")]
    NotAModulePackage(String),
}

impl LoadError {
    /// The kind of error value the failure becomes inside the graph.
    fn exception_type(&self) -> ExceptionType {
        match self {
            LoadError::Parse { .. } | LoadError::Json { .. } => ExceptionType::SyntaxError,
            _ => ExceptionType::TypeError,
        }
    }
}

/// How a file becomes a module, chosen by the `type` import attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    JavaScript,
    Json,
}

impl ModuleKind {
    pub fn of_request(request: &ModuleRequest) -> Result<Self, LoadError> {
        match request.attribute("type") {
            None => Ok(ModuleKind::JavaScript),
            Some("json") => Ok(ModuleKind::Json),
            Some(other) => Err(LoadError::UnsupportedModuleType(other.to_string())),
        }
    }
}

fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// LOAD_AS_FILE: `path` itself, or `path` with one of [`MAIN_EXTENSIONS`].
fn load_as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    MAIN_EXTENSIONS
        .iter()
        .map(|extension| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(extension);
            PathBuf::from(candidate)
        })
        .find(|candidate| candidate.is_file())
}

/// LOAD_INDEX: the first of [`INDEX_FILES`] inside `directory`.
fn load_index(directory: &Path) -> Option<PathBuf> {
    INDEX_FILES
        .iter()
        .map(|entry| directory.join(entry))
        .find(|candidate| candidate.is_file())
}

fn read_json(path: &Path) -> Result<(String, sonic_rs::Value), LoadError> {
    let source_text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json = sonic_rs::from_str(&source_text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((source_text, json))
}

/// The entry file of the package in `package`, described by its
/// `package.json` at `manifest`.
fn package_entry(name: &str, package: &Path, manifest: &Path) -> Result<PathBuf, LoadError> {
    let (_, json) = read_json(manifest)?;
    if json.get("type").and_then(|kind| kind.as_str()) != Some("module") {
        return Err(LoadError::NotAModulePackage(name.to_string()));
    }
    let entry = match json.get("main").and_then(|main| main.as_str()) {
        Some(main) => {
            let main = package.join(main);
            load_as_file(&main).or_else(|| load_index(&main))
        }
        None => load_index(package),
    };
    entry.ok_or_else(|| LoadError::NotFound {
        specifier: name.to_string(),
    })
}

/// PACKAGE_RESOLVE: finds package `name` in the `node_modules` of
/// `directory` or of its nearest ancestor that has it.
fn find_package(directory: &Path, name: &str) -> Result<PathBuf, LoadError> {
    if name.contains('/') || name.starts_with('.') {
        return Err(LoadError::UnsupportedSpecifier(name.to_string()));
    }
    for ancestor in directory.ancestors() {
        let package = ancestor.join("node_modules").join(name);
        let manifest = package.join("package.json");
        if manifest.is_file() {
            return package_entry(name, &package, &manifest);
        }
        if let Some(index) = load_index(&package) {
            return Ok(index);
        }
    }
    Err(LoadError::NotFound {
        specifier: name.to_string(),
    })
}

/// The path of a `file:` URL. Any other scheme is unsupported.
fn file_url_path(specifier: &str) -> Result<PathBuf, LoadError> {
    let unsupported = || LoadError::UnsupportedSpecifier(specifier.to_string());
    let url = Url::parse(specifier).map_err(|_| unsupported())?;
    if url.scheme() != "file" {
        return Err(unsupported());
    }
    url.to_file_path().map_err(|()| unsupported())
}

/// The `default` export of a JSON module. Objects and arrays are kept as
/// their JSON text.
fn json_module_value(agent: &mut Agent, json: &sonic_rs::Value, source_text: &str) -> Value {
    match json.get_type() {
        JsonType::Null => Value::Null,
        JsonType::Boolean => Value::Boolean(json.is_true()),
        JsonType::Number => json.as_f64().map_or(Value::Undefined, Value::Number),
        JsonType::String => Value::from_str(agent, json.as_str().unwrap_or_default()),
        JsonType::Array | JsonType::Object => Value::from_str(agent, source_text.trim()),
    }
}

pub fn canonicalize(specifier: &str, path: &Path) -> Result<PathBuf, LoadError> {
    fs::canonicalize(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            specifier: specifier.to_string(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[derive(Debug, Default)]
pub struct FsHost {
    modules: RefCell<AHashMap<PathBuf, SourceTextModule>>,
    json_modules: RefCell<AHashMap<PathBuf, SyntheticModule>>,
    rejected: AHashSet<PathBuf>,
    executed: RefCell<Vec<PathBuf>>,
    suspended: RefCell<VecDeque<(PathBuf, PromiseCapability)>>,
    parse_failures: RefCell<Vec<LoadError>>,
}

impl FsHost {
    pub fn new() -> &'static Self {
        Box::leak(Box::default())
    }

    /// Creates a host whose bodies at the canonical paths in `rejected`
    /// fail.
    pub fn rejecting(rejected: Vec<PathBuf>) -> &'static Self {
        Box::leak(Box::new(Self {
            rejected: rejected.into_iter().collect(),
            ..Default::default()
        }))
    }

    /// The canonical path a module was loaded from.
    pub fn path_of(&self, agent: &Agent, module: Module) -> Option<PathBuf> {
        let host_defined = module.host_defined(agent)?;
        host_defined.downcast_ref::<PathBuf>().cloned()
    }

    /// Resolves `specifier` to a canonical path. Relative specifiers are
    /// resolved against the directory of `referrer`, or the working
    /// directory if there is none.
    pub fn resolve(&self, referrer: Option<&Path>, specifier: &str) -> Result<PathBuf, LoadError> {
        let encoded = specifier.to_ascii_uppercase();
        if specifier.is_empty() || encoded.contains("%2F") || encoded.contains("%5C") {
            return Err(LoadError::UnsupportedSpecifier(specifier.to_string()));
        }
        let base = match referrer.and_then(Path::parent) {
            Some(directory) => directory.to_path_buf(),
            None => std::env::current_dir().map_err(|source| LoadError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let candidate = if is_relative_specifier(specifier) {
            base.join(specifier)
        } else if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else if specifier.contains(':') {
            file_url_path(specifier)?
        } else {
            find_package(&base, specifier)?
        };
        canonicalize(specifier, &candidate)
    }

    /// Returns the module at the canonical `path`, reading and parsing it on
    /// first use.
    pub fn load_path(&self, agent: &mut Agent, path: PathBuf) -> Result<SourceTextModule, LoadError> {
        if let Some(module) = self.modules.borrow().get(&path).copied() {
            return Ok(module);
        }
        let source_text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let host_defined: HostDefined = Rc::new(path.clone());
        let module = match parse_module(agent, &source_text, Some(host_defined)) {
            Ok(module) => module,
            Err(diagnostics) => {
                return Err(LoadError::Parse {
                    path,
                    source_text,
                    diagnostics,
                });
            }
        };
        debug!(path = %path.display(), "parsed module");
        self.modules.borrow_mut().insert(path, module);
        Ok(module)
    }

    /// Returns the JSON module at the canonical `path`, reading and parsing
    /// it on first use.
    pub fn load_json(&self, agent: &mut Agent, path: PathBuf) -> Result<SyntheticModule, LoadError> {
        if let Some(module) = self.json_modules.borrow().get(&path).copied() {
            return Ok(module);
        }
        let (source_text, json) = read_json(&path)?;
        let value = json_module_value(agent, &json, &source_text);
        let host_defined: HostDefined = Rc::new(path.clone());
        let module = SyntheticModule::new(agent, [("default", value)], Some(host_defined));
        debug!(path = %path.display(), "parsed JSON module");
        self.json_modules.borrow_mut().insert(path, module);
        Ok(module)
    }

    fn load(&self, agent: &mut Agent, path: PathBuf, kind: ModuleKind) -> Result<Module, LoadError> {
        match kind {
            ModuleKind::JavaScript => self.load_path(agent, path).map(Module::from),
            ModuleKind::Json => self.load_json(agent, path).map(Module::from),
        }
    }

    /// Loads the entry module of a graph from a path given by the user.
    pub fn load_entry(&self, agent: &mut Agent, entry: &str) -> Result<SourceTextModule, LoadError> {
        let path = canonicalize(entry, Path::new(entry))?;
        self.load_path(agent, path)
    }

    /// The first parse failure seen while loading, with its diagnostics.
    pub fn take_parse_failure(&self) -> Option<LoadError> {
        let mut failures = self.parse_failures.borrow_mut();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    }

    /// Paths of the bodies that ran, in order.
    pub fn executed(&self) -> Vec<PathBuf> {
        self.executed.borrow().clone()
    }

    /// Settles every suspended body, running the job queue after each one.
    /// Returns the number of bodies settled.
    pub fn settle_suspended(&self, agent: &mut Agent) -> usize {
        let mut settled = 0;
        loop {
            let next = self.suspended.borrow_mut().pop_front();
            let Some((path, capability)) = next else {
                break;
            };
            if self.rejected.contains(&path) {
                let error = agent.throw_exception(
                    ExceptionType::Error,
                    format!("'{}' rejected", path.display()),
                );
                capability.reject(agent, error);
            } else {
                capability.resolve(agent, Value::Undefined);
            }
            trace!(path = %path.display(), "settled suspended body");
            agent.run_jobs();
            settled += 1;
        }
        settled
    }

    fn throw(&self, agent: &mut Agent, error: LoadError) -> JsError {
        let exception = agent.throw_exception(error.exception_type(), error.to_string());
        if matches!(error, LoadError::Parse { .. }) {
            self.parse_failures.borrow_mut().push(error);
        }
        exception
    }

    fn initialize_declarations(&self, agent: &mut Agent, module: SourceTextModule) -> JsResult<()> {
        let Some(env) = module.environment(agent) else {
            return Ok(());
        };
        let uninitialized: Vec<String> = env
            .binding_names(agent)
            .filter(|name| !env.is_initialized(agent, name))
            .map(str::to_string)
            .collect();
        for name in uninitialized {
            env.initialize_binding(agent, &name, Value::Undefined)?;
        }
        Ok(())
    }
}

impl HostHooks for FsHost {
    fn load_imported_module(
        &self,
        agent: &mut Agent,
        referrer: Referrer,
        module_request: ModuleRequest,
        _host_defined: Option<HostDefined>,
        payload: ModuleLoadPayload,
    ) {
        let referrer_path = referrer
            .module()
            .and_then(|module| self.path_of(agent, module.into()));
        let result = ModuleKind::of_request(&module_request)
            .and_then(|kind| {
                let path = self.resolve(referrer_path.as_deref(), module_request.specifier())?;
                self.load(agent, path, kind)
            })
            .map_err(|error| self.throw(agent, error));
        finish_loading_imported_module(agent, referrer, &module_request, payload, result);
    }

    fn execute_module(
        &self,
        agent: &mut Agent,
        module: SourceTextModule,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()> {
        let path = self.path_of(agent, module.into()).unwrap_or_default();
        self.executed.borrow_mut().push(path.clone());
        let result = self.initialize_declarations(agent, module);
        match capability {
            Some(capability) => {
                match result {
                    Ok(()) => self.suspended.borrow_mut().push_back((path, capability)),
                    Err(error) => capability.reject(agent, error),
                }
                Ok(())
            }
            None => {
                result?;
                if self.rejected.contains(&path) {
                    return Err(agent.throw_exception(
                        ExceptionType::Error,
                        format!("'{}' threw", path.display()),
                    ));
                }
                Ok(())
            }
        }
    }

    fn get_supported_import_attributes(&self) -> &[&'static str] {
        &["type"]
    }
}
