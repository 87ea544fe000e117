// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The static, parse-time view of a module: what it requests, imports,
//! exports and declares.
//!
//! A [`ModuleUnit`] is produced either by [`parse_module_unit`] from source
//! text or directly through a [`ModuleUnitBuilder`], and is immutable once
//! built.

use ahash::AHashSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{self, Expression, Statement};
use oxc_ast_visit::{Visit, walk};
use oxc_diagnostics::OxcDiagnostic;
use oxc_ecmascript::BoundNames;
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::scope::ScopeFlags;

use super::abstract_module_records::ModuleRequest;

/// The local binding name of an anonymous `export default`.
pub const DEFAULT_BINDING_NAME: &str = "*default*";

/// ### [ImportEntry Record Fields](https://tc39.es/ecma262/#table-importentry-record-fields)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// ### \[\[ModuleRequest]]
    ///
    /// ModuleRequest Record representing the ModuleSpecifier and import
    /// attributes of the ImportDeclaration.
    module_request: ModuleRequest,
    /// ### \[\[ImportName]]
    ///
    /// The name under which the desired binding is exported by the module
    /// identified by \[\[ModuleRequest]]. `None` indicates that the import
    /// request is for the target module's namespace object.
    import_name: Option<Box<str>>,
    /// ### \[\[LocalName]]
    ///
    /// The name that is used to locally access the imported value from within
    /// the importing module.
    local_name: Box<str>,
}

impl ImportEntry {
    pub fn module_request(&self) -> &ModuleRequest {
        &self.module_request
    }

    pub fn import_name(&self) -> Option<&str> {
        self.import_name.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

/// ## [ExportEntry Record Fields](https://tc39.es/ecma262/#table-exportentry-records)
///
/// This struct is used for local export declarations.
///
/// ```javascript
/// export { x };
/// export var x;
/// export function x() {}
/// export default 1;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExportEntry {
    /// ### \[\[ExportName]]
    export_name: Box<str>,
    /// ### \[\[LocalName]]
    local_name: Box<str>,
}

impl LocalExportEntry {
    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

/// ## [ExportEntry Record Fields](https://tc39.es/ecma262/#table-exportentry-records)
///
/// This struct is used for re-export declarations.
///
/// ```javascript
/// export * as ns from "mod";
/// export { x } from "mod";
/// export { v as x } from "mod";
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectExportEntry {
    /// ### \[\[ExportName]]
    export_name: Box<str>,
    /// ### \[\[ModuleRequest]]
    module_request: ModuleRequest,
    /// ### \[\[ImportName]]
    ///
    /// `None` is used for `export * as ns from "mod"` declarations.
    import_name: Option<Box<str>>,
}

impl IndirectExportEntry {
    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    pub fn module_request(&self) -> &ModuleRequest {
        &self.module_request
    }

    pub fn import_name(&self) -> Option<&str> {
        self.import_name.as_deref()
    }
}

/// The kind of a top level declaration, which decides how its binding is
/// created in the module environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Var,
    Function,
    Let,
    Const,
    Class,
}

impl DeclarationKind {
    /// Var and function bindings are initialized to undefined when the
    /// environment is created; the others start in their temporal dead zone.
    pub fn is_var_scoped(self) -> bool {
        matches!(self, DeclarationKind::Var | DeclarationKind::Function)
    }

    /// ### [8.2.3 Static Semantics: IsConstantDeclaration](https://tc39.es/ecma262/#sec-static-semantics-isconstantdeclaration)
    pub fn is_constant(self) -> bool {
        matches!(self, DeclarationKind::Const)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationKind::Var => "var",
            DeclarationKind::Function => "function",
            DeclarationKind::Let => "let",
            DeclarationKind::Const => "const",
            DeclarationKind::Class => "class",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDeclaration {
    name: Box<str>,
    kind: DeclarationKind,
}

impl LocalDeclaration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }
}

/// The parsed, immutable dependency list and export declarations of one
/// module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleUnit {
    requested_modules: Box<[ModuleRequest]>,
    import_entries: Box<[ImportEntry]>,
    local_export_entries: Box<[LocalExportEntry]>,
    indirect_export_entries: Box<[IndirectExportEntry]>,
    star_export_entries: Box<[ModuleRequest]>,
    declarations: Box<[LocalDeclaration]>,
    has_top_level_await: bool,
}

impl ModuleUnit {
    pub fn builder() -> ModuleUnitBuilder {
        ModuleUnitBuilder::default()
    }

    /// ### \[\[RequestedModules]]
    ///
    /// In source text occurrence order, without duplicates.
    pub fn requested_modules(&self) -> &[ModuleRequest] {
        &self.requested_modules
    }

    /// ### \[\[ImportEntries]]
    pub fn import_entries(&self) -> &[ImportEntry] {
        &self.import_entries
    }

    /// ### \[\[LocalExportEntries]]
    pub fn local_export_entries(&self) -> &[LocalExportEntry] {
        &self.local_export_entries
    }

    /// ### \[\[IndirectExportEntries]]
    pub fn indirect_export_entries(&self) -> &[IndirectExportEntry] {
        &self.indirect_export_entries
    }

    /// ### \[\[StarExportEntries]]
    pub fn star_export_entries(&self) -> &[ModuleRequest] {
        &self.star_export_entries
    }

    /// Bindings declared at the top level of the module, excluding imports.
    pub fn declarations(&self) -> &[LocalDeclaration] {
        &self.declarations
    }

    /// ### \[\[HasTLA]]
    pub fn has_top_level_await(&self) -> bool {
        self.has_top_level_await
    }
}

#[derive(Debug, Clone)]
enum ExportDeclaration {
    Local {
        local_name: Box<str>,
        export_name: Box<str>,
    },
    From {
        module_request: ModuleRequest,
        import_name: Option<Box<str>>,
        export_name: Box<str>,
    },
    Star(ModuleRequest),
}

/// Builds a [`ModuleUnit`] from module declarations in source order.
///
/// Re-exports of imported bindings (`import { a } from "m"; export { a }`)
/// are turned into indirect exports when the unit is built, as ParseModule
/// does.
#[derive(Debug, Clone, Default)]
pub struct ModuleUnitBuilder {
    requests: Vec<ModuleRequest>,
    imports: Vec<ImportEntry>,
    exports: Vec<ExportDeclaration>,
    declarations: Vec<LocalDeclaration>,
    has_top_level_await: bool,
}

impl ModuleUnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `import "mod";`
    pub fn import_module(mut self, request: impl Into<ModuleRequest>) -> Self {
        self.requests.push(request.into());
        self
    }

    /// `import { importName as localName } from "mod";`
    pub fn import(
        mut self,
        request: impl Into<ModuleRequest>,
        import_name: &str,
        local_name: &str,
    ) -> Self {
        let module_request = request.into();
        self.requests.push(module_request.clone());
        self.imports.push(ImportEntry {
            module_request,
            import_name: Some(import_name.into()),
            local_name: local_name.into(),
        });
        self
    }

    /// `import * as localName from "mod";`
    pub fn import_namespace(mut self, request: impl Into<ModuleRequest>, local_name: &str) -> Self {
        let module_request = request.into();
        self.requests.push(module_request.clone());
        self.imports.push(ImportEntry {
            module_request,
            import_name: None,
            local_name: local_name.into(),
        });
        self
    }

    /// `export { localName as exportName };`
    pub fn export(mut self, local_name: &str, export_name: &str) -> Self {
        self.exports.push(ExportDeclaration::Local {
            local_name: local_name.into(),
            export_name: export_name.into(),
        });
        self
    }

    /// `export { importName as exportName } from "mod";`
    pub fn export_from(
        mut self,
        request: impl Into<ModuleRequest>,
        import_name: &str,
        export_name: &str,
    ) -> Self {
        let module_request = request.into();
        self.requests.push(module_request.clone());
        self.exports.push(ExportDeclaration::From {
            module_request,
            import_name: Some(import_name.into()),
            export_name: export_name.into(),
        });
        self
    }

    /// `export * as exportName from "mod";`
    pub fn export_namespace_from(
        mut self,
        request: impl Into<ModuleRequest>,
        export_name: &str,
    ) -> Self {
        let module_request = request.into();
        self.requests.push(module_request.clone());
        self.exports.push(ExportDeclaration::From {
            module_request,
            import_name: None,
            export_name: export_name.into(),
        });
        self
    }

    /// `export * from "mod";`
    pub fn export_star_from(mut self, request: impl Into<ModuleRequest>) -> Self {
        let module_request = request.into();
        self.requests.push(module_request.clone());
        self.exports.push(ExportDeclaration::Star(module_request));
        self
    }

    /// A top level declaration of `name`. Repeated declarations of a name
    /// keep the first kind.
    pub fn declare(mut self, name: &str, kind: DeclarationKind) -> Self {
        if !self.declarations.iter().any(|d| &*d.name == name) {
            self.declarations.push(LocalDeclaration {
                name: name.into(),
                kind,
            });
        }
        self
    }

    /// `export let name;` and friends: declares `name` and exports it under
    /// the same name.
    pub fn export_declaration(self, name: &str, kind: DeclarationKind) -> Self {
        self.declare(name, kind).export(name, name)
    }

    /// `export default <expression>;`
    pub fn export_default_expression(self) -> Self {
        self.declare(DEFAULT_BINDING_NAME, DeclarationKind::Let)
            .export(DEFAULT_BINDING_NAME, "default")
    }

    /// Marks the module body as containing top level await.
    pub fn top_level_await(mut self) -> Self {
        self.has_top_level_await = true;
        self
    }

    /// ### [16.2.1.7.1 ParseModule ( sourceText, realm, hostDefined )](https://tc39.es/ecma262/#sec-parsemodule)
    ///
    /// Steps 3 to 10: sorts the export declarations into local, indirect and
    /// star export entries.
    pub fn build(self) -> ModuleUnit {
        let Self {
            requests,
            imports,
            exports,
            declarations,
            has_top_level_await,
        } = self;
        // 3. Let requestedModules be the ModuleRequests of body.
        let mut seen = AHashSet::with_capacity(requests.len());
        let requested_modules = requests
            .into_iter()
            .filter(|request| seen.insert(request.clone()))
            .collect::<Box<[_]>>();
        // 6. Let indirectExportEntries be a new empty List.
        let mut indirect_export_entries = vec![];
        // 7. Let localExportEntries be a new empty List.
        let mut local_export_entries = vec![];
        // 8. Let starExportEntries be a new empty List.
        let mut star_export_entries = vec![];
        // 10. For each ExportEntry Record ee of exportEntries, do
        for ee in exports {
            match ee {
                // a. If ee.[[ModuleRequest]] is null, then
                ExportDeclaration::Local {
                    local_name,
                    export_name,
                } => {
                    // i. If importedBoundNames does not contain
                    //    ee.[[LocalName]], then
                    let ie = imports.iter().find(|ie| ie.local_name == local_name);
                    match ie {
                        // 2. If ie.[[ImportName]] is not namespace-object, then
                        Some(ImportEntry {
                            module_request,
                            import_name: Some(import_name),
                            ..
                        }) => {
                            // a. NOTE: This is a re-export of a single name.
                            indirect_export_entries.push(IndirectExportEntry {
                                export_name,
                                module_request: module_request.clone(),
                                import_name: Some(import_name.clone()),
                            });
                        }
                        // 1. Append ee to localExportEntries.
                        // 3. Else: NOTE: This is a re-export of an imported
                        //    module namespace object.
                        _ => local_export_entries.push(LocalExportEntry {
                            export_name,
                            local_name,
                        }),
                    }
                }
                // c. Else,
                ExportDeclaration::From {
                    module_request,
                    import_name,
                    export_name,
                } => indirect_export_entries.push(IndirectExportEntry {
                    export_name,
                    module_request,
                    import_name,
                }),
                // b. Else if ee.[[ImportName]] is all-but-default, then
                ExportDeclaration::Star(module_request) => star_export_entries.push(module_request),
            }
        }
        ModuleUnit {
            requested_modules,
            import_entries: imports.into_boxed_slice(),
            local_export_entries: local_export_entries.into_boxed_slice(),
            indirect_export_entries: indirect_export_entries.into_boxed_slice(),
            star_export_entries: star_export_entries.into_boxed_slice(),
            declarations: declarations.into_boxed_slice(),
            has_top_level_await,
        }
    }
}

/// Parses `source_text` with the Module goal symbol and extracts its
/// [`ModuleUnit`].
///
/// With the `typescript` feature enabled TypeScript syntax is accepted and
/// type-only imports and exports are skipped.
pub fn parse_module_unit(source_text: &str) -> Result<ModuleUnit, Vec<OxcDiagnostic>> {
    let source_type = if cfg!(feature = "typescript") {
        SourceType::default()
            .with_module(true)
            .with_typescript(true)
    } else {
        SourceType::default().with_module(true)
    };
    let allocator = Allocator::default();
    let parser_return = Parser::new(&allocator, source_text, source_type).parse();
    // 2. If body is a List of errors, return body.
    if !parser_return.errors.is_empty() {
        return Err(parser_return.errors);
    }
    let program = parser_return.program;

    let mut builder = ModuleUnitBuilder::new();
    for statement in program.body.iter() {
        builder = match statement.as_module_declaration() {
            Some(declaration) => module_declaration(builder, declaration),
            None => statement_declarations(builder, statement),
        };
    }
    // 11. Let async be body Contains await.
    let mut finder = TopLevelAwaitFinder::default();
    finder.visit_program(&program);
    if finder.found {
        builder = builder.top_level_await();
    }
    Ok(builder.build())
}

fn module_request(source: &ast::StringLiteral, with_clause: Option<&ast::WithClause>) -> ModuleRequest {
    let Some(with_clause) = with_clause else {
        return ModuleRequest::new(source.value.as_str());
    };
    ModuleRequest::with_attributes(
        source.value.as_str(),
        with_clause.with_entries.iter().map(|attribute| {
            let key = match &attribute.key {
                ast::ImportAttributeKey::Identifier(key) => key.name.as_str(),
                ast::ImportAttributeKey::StringLiteral(key) => key.value.as_str(),
            };
            (key, attribute.value.value.as_str())
        }),
    )
}

fn module_declaration(
    mut builder: ModuleUnitBuilder,
    declaration: &ast::ModuleDeclaration,
) -> ModuleUnitBuilder {
    match declaration {
        ast::ModuleDeclaration::ImportDeclaration(decl) => {
            #[cfg(feature = "typescript")]
            if decl.import_kind.is_type() {
                return builder;
            }
            let request = module_request(&decl.source, decl.with_clause.as_deref());
            let Some(specifiers) = &decl.specifiers else {
                return builder.import_module(request);
            };
            if specifiers.is_empty() {
                return builder.import_module(request);
            }
            for specifier in specifiers.iter() {
                builder = match specifier {
                    ast::ImportDeclarationSpecifier::ImportSpecifier(specifier) => {
                        #[cfg(feature = "typescript")]
                        if specifier.import_kind.is_type() {
                            continue;
                        }
                        builder.import(
                            request.clone(),
                            specifier.imported.name().as_str(),
                            specifier.local.name.as_str(),
                        )
                    }
                    ast::ImportDeclarationSpecifier::ImportDefaultSpecifier(specifier) => {
                        builder.import(request.clone(), "default", specifier.local.name.as_str())
                    }
                    ast::ImportDeclarationSpecifier::ImportNamespaceSpecifier(specifier) => {
                        builder.import_namespace(request.clone(), specifier.local.name.as_str())
                    }
                };
            }
            builder
        }
        ast::ModuleDeclaration::ExportAllDeclaration(decl) => {
            #[cfg(feature = "typescript")]
            if decl.export_kind.is_type() {
                return builder;
            }
            let request = module_request(&decl.source, decl.with_clause.as_deref());
            match &decl.exported {
                // export * as ns from "mod";
                Some(exported) => builder.export_namespace_from(request, exported.name().as_str()),
                // export * from "mod";
                None => builder.export_star_from(request),
            }
        }
        ast::ModuleDeclaration::ExportDefaultDeclaration(decl) => match &decl.declaration {
            ast::ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                let local_name = function
                    .id
                    .as_ref()
                    .map_or(DEFAULT_BINDING_NAME, |id| id.name.as_str());
                builder
                    .declare(local_name, DeclarationKind::Function)
                    .export(local_name, "default")
            }
            ast::ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                let local_name = class
                    .id
                    .as_ref()
                    .map_or(DEFAULT_BINDING_NAME, |id| id.name.as_str());
                builder
                    .declare(local_name, DeclarationKind::Class)
                    .export(local_name, "default")
            }
            ast::ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => builder,
            _ => builder.export_default_expression(),
        },
        ast::ModuleDeclaration::ExportNamedDeclaration(decl) => {
            #[cfg(feature = "typescript")]
            if decl.export_kind.is_type() {
                return builder;
            }
            if let Some(source) = &decl.source {
                // export { a, b as c } from "source";
                let request = module_request(source, decl.with_clause.as_deref());
                for specifier in decl.specifiers.iter() {
                    builder = builder.export_from(
                        request.clone(),
                        specifier.local.name().as_str(),
                        specifier.exported.name().as_str(),
                    );
                }
                builder
            } else if let Some(declaration) = &decl.declaration {
                // export var d; export function g() {} ...
                let mut names = vec![];
                declaration_bound_names(declaration, &mut |name, kind| names.push((name, kind)));
                for (name, kind) in names {
                    builder = builder.export_declaration(name, kind);
                }
                builder
            } else {
                // export { a, b as c };
                for specifier in decl.specifiers.iter() {
                    #[cfg(feature = "typescript")]
                    if specifier.export_kind.is_type() {
                        continue;
                    }
                    builder = builder.export(
                        specifier.local.name().as_str(),
                        specifier.exported.name().as_str(),
                    );
                }
                builder
            }
        }
        _ => builder,
    }
}

fn variable_declaration_kind(kind: ast::VariableDeclarationKind) -> DeclarationKind {
    match kind {
        ast::VariableDeclarationKind::Var => DeclarationKind::Var,
        ast::VariableDeclarationKind::Let => DeclarationKind::Let,
        _ => DeclarationKind::Const,
    }
}

fn declaration_bound_names<'a>(
    declaration: &'a ast::Declaration<'a>,
    f: &mut impl FnMut(&'a str, DeclarationKind),
) {
    match declaration {
        ast::Declaration::VariableDeclaration(decl) => {
            let kind = variable_declaration_kind(decl.kind);
            decl.bound_names(&mut |id| f(id.name.as_str(), kind));
        }
        ast::Declaration::FunctionDeclaration(function) => {
            if let Some(id) = &function.id {
                f(id.name.as_str(), DeclarationKind::Function);
            }
        }
        ast::Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                f(id.name.as_str(), DeclarationKind::Class);
            }
        }
        _ => {}
    }
}

/// Top level declarations of a statement that is not a module declaration:
/// lexical declarations of the statement itself, and var declarations
/// hoisted out of nested blocks.
fn statement_declarations(mut builder: ModuleUnitBuilder, statement: &Statement) -> ModuleUnitBuilder {
    match statement {
        Statement::VariableDeclaration(decl) => {
            let kind = variable_declaration_kind(decl.kind);
            let mut names = vec![];
            decl.bound_names(&mut |id| names.push(id.name.as_str()));
            for name in names {
                builder = builder.declare(name, kind);
            }
            builder
        }
        Statement::FunctionDeclaration(function) => match &function.id {
            Some(id) => builder.declare(id.name.as_str(), DeclarationKind::Function),
            None => builder,
        },
        Statement::ClassDeclaration(class) => match &class.id {
            Some(id) => builder.declare(id.name.as_str(), DeclarationKind::Class),
            None => builder,
        },
        _ => {
            let mut names = vec![];
            nested_var_names(statement, &mut names);
            for name in names {
                builder = builder.declare(name, DeclarationKind::Var);
            }
            builder
        }
    }
}

/// ### [8.2.6 Static Semantics: VarDeclaredNames](https://tc39.es/ecma262/#sec-static-semantics-vardeclarednames)
///
/// Only descends into statements; function bodies have their own var scope.
fn nested_var_names<'a>(statement: &'a Statement<'a>, names: &mut Vec<&'a str>) {
    let mut var_declaration = |decl: &'a ast::VariableDeclaration<'a>| {
        if decl.kind == ast::VariableDeclarationKind::Var {
            decl.bound_names(&mut |id| names.push(id.name.as_str()));
        }
    };
    match statement {
        Statement::VariableDeclaration(decl) => var_declaration(decl),
        Statement::BlockStatement(block) => {
            for statement in block.body.iter() {
                nested_var_names(statement, names);
            }
        }
        Statement::IfStatement(stmt) => {
            nested_var_names(&stmt.consequent, names);
            if let Some(alternate) = &stmt.alternate {
                nested_var_names(alternate, names);
            }
        }
        Statement::ForStatement(stmt) => {
            if let Some(ast::ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
                var_declaration(decl);
            }
            nested_var_names(&stmt.body, names);
        }
        Statement::ForInStatement(stmt) => {
            if let ast::ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
                var_declaration(decl);
            }
            nested_var_names(&stmt.body, names);
        }
        Statement::ForOfStatement(stmt) => {
            if let ast::ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
                var_declaration(decl);
            }
            nested_var_names(&stmt.body, names);
        }
        Statement::WhileStatement(stmt) => nested_var_names(&stmt.body, names),
        Statement::DoWhileStatement(stmt) => nested_var_names(&stmt.body, names),
        Statement::LabeledStatement(stmt) => nested_var_names(&stmt.body, names),
        Statement::TryStatement(stmt) => {
            for statement in stmt.block.body.iter() {
                nested_var_names(statement, names);
            }
            if let Some(handler) = &stmt.handler {
                for statement in handler.body.body.iter() {
                    nested_var_names(statement, names);
                }
            }
            if let Some(finalizer) = &stmt.finalizer {
                for statement in finalizer.body.iter() {
                    nested_var_names(statement, names);
                }
            }
        }
        Statement::SwitchStatement(stmt) => {
            for case in stmt.cases.iter() {
                for statement in case.consequent.iter() {
                    nested_var_names(statement, names);
                }
            }
        }
        _ => {}
    }
}

/// Looks for `await`, `for await` and `await using` outside of any function
/// body, class field or static block.
#[derive(Debug, Default)]
struct TopLevelAwaitFinder {
    found: bool,
}

impl<'a> Visit<'a> for TopLevelAwaitFinder {
    fn visit_statement(&mut self, it: &Statement<'a>) {
        if !self.found {
            walk::walk_statement(self, it);
        }
    }

    fn visit_expression(&mut self, it: &Expression<'a>) {
        if !self.found {
            walk::walk_expression(self, it);
        }
    }

    fn visit_await_expression(&mut self, _: &ast::AwaitExpression<'a>) {
        self.found = true;
    }

    fn visit_for_of_statement(&mut self, it: &ast::ForOfStatement<'a>) {
        if it.r#await {
            self.found = true;
            return;
        }
        walk::walk_for_of_statement(self, it);
    }

    fn visit_variable_declaration(&mut self, it: &ast::VariableDeclaration<'a>) {
        if it.kind == ast::VariableDeclarationKind::AwaitUsing {
            self.found = true;
            return;
        }
        walk::walk_variable_declaration(self, it);
    }

    fn visit_function(&mut self, _: &ast::Function<'a>, _: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _: &ast::ArrowFunctionExpression<'a>) {}

    // Decorators and computed keys run in the enclosing scope, initializers
    // do not.
    fn visit_property_definition(&mut self, it: &ast::PropertyDefinition<'a>) {
        for decorator in it.decorators.iter() {
            self.visit_decorator(decorator);
        }
        self.visit_property_key(&it.key);
    }

    fn visit_accessor_property(&mut self, it: &ast::AccessorProperty<'a>) {
        for decorator in it.decorators.iter() {
            self.visit_decorator(decorator);
        }
        self.visit_property_key(&it.key);
    }

    fn visit_static_block(&mut self, _: &ast::StaticBlock<'a>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_turns_reexported_imports_into_indirect_exports() {
        let unit = ModuleUnitBuilder::new()
            .import("./a.js", "x", "y")
            .import_namespace("./b.js", "ns")
            .export("y", "z")
            .export("ns", "ns")
            .export_star_from("./a.js")
            .build();
        assert_eq!(unit.requested_modules().len(), 2);
        assert_eq!(unit.requested_modules()[0].specifier(), "./a.js");
        let [indirect] = unit.indirect_export_entries() else {
            panic!("expected one indirect export");
        };
        assert_eq!(indirect.export_name(), "z");
        assert_eq!(indirect.import_name(), Some("x"));
        assert_eq!(indirect.module_request().specifier(), "./a.js");
        let [local] = unit.local_export_entries() else {
            panic!("expected one local export");
        };
        assert_eq!(local.local_name(), "ns");
        assert_eq!(unit.star_export_entries().len(), 1);
    }

    #[test]
    fn parses_imports_exports_and_declarations() {
        let unit = parse_module_unit(
            r#"
            import def, { a as b } from "./a.js";
            import * as ns from "./b.js";
            import "./side-effect.js";
            export { b, ns };
            export * from "./c.js";
            export * as c from "./c.js";
            export { q as r } from "./d.js" with { type: "json" };
            export const k = 1;
            let l;
            if (l) { var hoisted = 2; }
            export default function () {}
            "#,
        )
        .unwrap();
        let specifiers: Vec<_> = unit
            .requested_modules()
            .iter()
            .map(|request| request.specifier())
            .collect();
        assert_eq!(
            specifiers,
            ["./a.js", "./b.js", "./side-effect.js", "./c.js", "./d.js"]
        );
        assert_eq!(unit.import_entries().len(), 3);
        assert_eq!(unit.import_entries()[0].import_name(), Some("default"));
        assert_eq!(unit.import_entries()[2].import_name(), None);
        assert_eq!(
            unit.requested_modules()[4].attribute("type"),
            Some("json")
        );

        let indirect: Vec<_> = unit
            .indirect_export_entries()
            .iter()
            .map(|e| (e.export_name(), e.import_name()))
            .collect();
        assert_eq!(indirect, [("b", Some("a")), ("c", None), ("r", Some("q"))]);
        let local: Vec<_> = unit
            .local_export_entries()
            .iter()
            .map(|e| (e.export_name(), e.local_name()))
            .collect();
        assert_eq!(
            local,
            [("ns", "ns"), ("k", "k"), ("default", DEFAULT_BINDING_NAME)]
        );
        let declarations: Vec<_> = unit
            .declarations()
            .iter()
            .map(|d| (d.name(), d.kind()))
            .collect();
        assert_eq!(
            declarations,
            [
                ("k", DeclarationKind::Const),
                ("l", DeclarationKind::Let),
                ("hoisted", DeclarationKind::Var),
                (DEFAULT_BINDING_NAME, DeclarationKind::Function),
            ]
        );
        assert!(!unit.has_top_level_await());
    }

    #[test]
    fn detects_top_level_await() {
        let unit = parse_module_unit("const x = await Promise.resolve(1);").unwrap();
        assert!(unit.has_top_level_await());
        let unit = parse_module_unit("for await (const x of y) {}").unwrap();
        assert!(unit.has_top_level_await());
        let unit = parse_module_unit("if (a) { foo(await b); }").unwrap();
        assert!(unit.has_top_level_await());
        for source_text in [
            "a?.b(await x);",
            "obj[await k] = 1;",
            "class C extends (await B) {}",
            "export class D extends (await B) {}",
            "let c = class { [await k]() {} };",
            "class E { static [await k] = 1; }",
            "export default await x;",
            "label: for (;;) { while (await next()) {} }",
            "try {} finally { await cleanup(); }",
            "await using resource = open();",
            "const { [await k]: v } = obj;",
        ] {
            let unit = parse_module_unit(source_text).unwrap();
            assert!(unit.has_top_level_await(), "{source_text}");
        }
    }

    #[cfg(feature = "typescript")]
    #[test]
    fn detects_top_level_await_in_typescript_expressions() {
        for source_text in [
            "const a = (await x) as number;",
            "const b = (await x)!;",
            "const c = (await x) satisfies object;",
        ] {
            let unit = parse_module_unit(source_text).unwrap();
            assert!(unit.has_top_level_await(), "{source_text}");
        }
    }

    #[test]
    fn await_inside_functions_is_not_top_level() {
        let unit = parse_module_unit(
            "async function f() { await g(); }\nconst h = async () => { await f(); };",
        )
        .unwrap();
        assert!(!unit.has_top_level_await());
    }

    #[test]
    fn await_inside_class_bodies_is_not_top_level() {
        for source_text in [
            "class C { async m() { await x; } }",
            "class D { f = async () => await x; }",
            "const o = { async m() { await x; }, get g() { return 1; } };",
            "export default async function () { for await (const x of y) {} }",
        ] {
            let unit = parse_module_unit(source_text).unwrap();
            assert!(!unit.has_top_level_await(), "{source_text}");
        }
    }

    #[test]
    fn syntax_errors_are_reported() {
        let errors = parse_module_unit("import { from './a.js';").unwrap_err();
        assert!(!errors.is_empty());
    }
}
