//! Symbol database (C5): scopes, variables, functions and types recovered
//! from the simplified token list, plus name resolution and the token-level
//! AST built on top of it.

pub mod ast;

use std::collections::HashMap;

use crate::ids::{FunctionId, ScopeId, TokenId, TypeId, VariableId};
use crate::token::{TokenKind, TokenList};

/// Kind of lexical scope (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Token of the opening `{`, `None` for the implicit global scope.
    pub open: Option<TokenId>,
    /// Token of the closing `}`, `None` until the scope is closed (or for
    /// the global scope).
    pub close: Option<TokenId>,
    pub variables: Vec<VariableId>,
    pub functions: Vec<FunctionId>,
    /// Set on a `Function`-kind scope to the function whose body it is
    /// (`spec.md` §3 Scope attribute "for a function scope, a reference to
    /// the function"); `None` for every other scope kind.
    pub owning_function: Option<FunctionId>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub scope: ScopeId,
    pub declaration: TokenId,
    pub type_name: String,
    pub is_pointer: bool,
    pub is_reference: bool,
    pub is_parameter: bool,
    pub is_array: bool,
    /// True when `scope`'s kind is `Function`/`Block` rather than
    /// `Global`/`Namespace`/`Class` (`spec.md` §3 Variable classification
    /// bit `is-local`; used by C6 to decide whether a read with no prior
    /// write in this TU counts as "uninitialized" or merely "unknown
    /// external state").
    pub is_local: bool,
    /// One entry per `[...]` in the declarator; `None` for an unsized
    /// dimension (`spec.md` §3 Variable attribute `array-dimensions`).
    pub array_dimensions: Vec<Option<i64>>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub scope: ScopeId,
    /// Scope created by the function's own body, if this declaration has
    /// one (a prototype never gets a body scope).
    pub body_scope: Option<ScopeId>,
    pub declaration: TokenId,
    pub parameters: Vec<VariableId>,
    pub return_type: String,
    pub is_static: bool,
    /// Parameter shapes read off the declarator's `(...)`, before a body (if
    /// any) exists to host them as [`Variable`]s.
    param_specs: Vec<ParamSpec>,
}

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    name_token: TokenId,
    type_name: String,
    is_pointer: bool,
    is_reference: bool,
}

/// What kind of declaration [`try_register_declaration`] recognized, so the
/// caller knows whether to track a possible function body next.
enum DeclKind {
    Function(FunctionId),
    Variable(VariableId),
}

#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub declaration: Option<TokenId>,
    pub is_builtin: bool,
}

const BUILTIN_TYPES: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "bool", "signed", "unsigned", "size_t", "wchar_t",
];

const DECL_STARTERS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "bool", "signed", "unsigned", "const", "struct",
    "class", "enum", "auto",
];

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch"];

/// The full symbol table for one translation unit.
#[derive(Debug, Default)]
pub struct SymbolDatabase {
    pub scopes: Vec<Scope>,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    pub types: Vec<Type>,
    name_to_type: HashMap<String, TypeId>,
}

impl SymbolDatabase {
    pub fn global_scope(&self) -> ScopeId {
        ScopeId::from_index(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn type_of(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    fn intern_type(&mut self, name: &str, is_builtin: bool) -> TypeId {
        if let Some(&id) = self.name_to_type.get(name) {
            return id;
        }
        let id = TypeId::from_index(self.types.len());
        self.types.push(Type {
            name: name.to_string(),
            declaration: None,
            is_builtin,
        });
        self.name_to_type.insert(name.to_string(), id);
        id
    }

    /// Resolve `name` starting in `from`, walking outward through enclosing
    /// scopes (innermost-out), per `spec.md` §4.4. Returns the nearest
    /// enclosing declaration, or `None` if nothing matches — callers must
    /// treat that as "unresolved", not an error.
    pub fn resolve_variable(&self, from: ScopeId, name: &str) -> Option<VariableId> {
        let mut cur = Some(from);
        while let Some(scope_id) = cur {
            let scope = self.scope(scope_id);
            if let Some(&v) = scope
                .variables
                .iter()
                .rev()
                .find(|&&v| self.variable(v).name == name)
            {
                return Some(v);
            }
            cur = scope.parent;
        }
        None
    }

    pub fn resolve_function(&self, from: ScopeId, name: &str) -> Option<FunctionId> {
        let mut cur = Some(from);
        while let Some(scope_id) = cur {
            let scope = self.scope(scope_id);
            if let Some(&f) = scope.functions.iter().find(|&&f| self.function(f).name == name) {
                return Some(f);
            }
            cur = scope.parent;
        }
        None
    }

    /// The function whose body lexically contains `from`, walking outward
    /// through enclosing scopes. Used by CTU-granularity checks to name the
    /// caller of a call site (`spec.md` §4.7 call-point facts).
    pub fn enclosing_function(&self, from: ScopeId) -> Option<FunctionId> {
        let mut cur = Some(from);
        while let Some(scope_id) = cur {
            let scope = self.scope(scope_id);
            if let Some(func) = scope.owning_function {
                return Some(func);
            }
            cur = scope.parent;
        }
        None
    }
}

/// Build the symbol database for a translation unit.
///
/// One left-to-right pass: every `{` opens a scope (kind inferred from the
/// tokens immediately preceding it), every linked `}` closes the innermost
/// open scope, and a declaration-shaped run of tokens (`DECL_STARTERS` or a
/// known type name, then `*`/`&`, then an identifier) registers a variable
/// or a function in the scope it appears in. Member-access resolution that
/// can't find a declaration leaves `variable_ref` unset rather than
/// failing the whole pass (`spec.md` §4.4 "Failure").
pub fn build(list: &TokenList) -> SymbolDatabase {
    let mut db = SymbolDatabase::default();
    db.scopes.push(Scope {
        kind: ScopeKind::Global,
        name: None,
        parent: None,
        children: Vec::new(),
        open: None,
        close: None,
        variables: Vec::new(),
        functions: Vec::new(),
        owning_function: None,
    });
    for &name in BUILTIN_TYPES {
        db.intern_type(name, true);
    }

    let mut scope_stack = vec![db.global_scope()];
    let mut cur = list.tokens();
    // Set right after a function declarator is registered; consumed by the
    // very next token if it's the `{` that opens the function's body, and
    // dropped otherwise (a `;`-terminated prototype has no body scope).
    let mut pending_function: Option<FunctionId> = None;

    while let Some(id) = cur {
        let tok = list.get(id);
        let text = tok.text.as_str();

        if text == "{" {
            let kind = infer_scope_kind(list, id);
            let parent = *scope_stack.last().unwrap();
            let new_id = ScopeId::from_index(db.scopes.len());
            db.scopes.push(Scope {
                kind,
                name: None,
                parent: Some(parent),
                children: Vec::new(),
                open: Some(id),
                close: list.link(id),
                variables: Vec::new(),
                functions: Vec::new(),
                owning_function: None,
            });
            db.scopes[parent.index()].children.push(new_id);
            scope_stack.push(new_id);

            if let Some(func_id) = pending_function.take() {
                register_function_params(&mut db, func_id, new_id);
                db.functions[func_id.index()].body_scope = Some(new_id);
                db.scopes[new_id.index()].owning_function = Some(func_id);
            }

            cur = list.next(id);
            continue;
        }

        // Any token other than the immediately following `{` means the
        // pending function declarator was a prototype, not a definition.
        pending_function = None;

        if text == "}" {
            if scope_stack.len() > 1 {
                scope_stack.pop();
            }
            cur = list.next(id);
            continue;
        }

        if is_declaration_start(list, id) {
            if let Some((decl_end, kind)) = try_register_declaration(list, &mut db, *scope_stack.last().unwrap(), id) {
                if let DeclKind::Function(func_id) = kind {
                    pending_function = Some(func_id);
                }
                cur = list.next(decl_end);
                continue;
            }
        }

        cur = list.next(id);
    }

    db
}

/// Materialize a function's [`ParamSpec`]s as [`Variable`]s in its body
/// scope, once we know the declarator really did get a body (`spec.md` §4.4
/// "Failure" — a prototype never creates these, so plain forward
/// declarations don't pollute any scope with unreachable parameter names).
fn register_function_params(db: &mut SymbolDatabase, func_id: FunctionId, body_scope: ScopeId) {
    let specs = db.functions[func_id.index()].param_specs.clone();
    let mut param_ids = Vec::with_capacity(specs.len());
    for spec in &specs {
        let var_id = VariableId::from_index(db.variables.len());
        db.variables.push(Variable {
            name: spec.name.clone(),
            scope: body_scope,
            declaration: spec.name_token,
            type_name: spec.type_name.clone(),
            is_pointer: spec.is_pointer,
            is_reference: spec.is_reference,
            is_parameter: true,
            is_array: false,
            array_dimensions: Vec::new(),
            is_local: true,
        });
        db.scopes[body_scope.index()].variables.push(var_id);
        param_ids.push(var_id);
    }
    db.functions[func_id.index()].parameters = param_ids;
}

fn infer_scope_kind(list: &TokenList, open: TokenId) -> ScopeKind {
    let mut cur = list.prev(open);
    while let Some(id) = cur {
        let text = list.get(id).text.clone();
        match text.as_str() {
            ")" => return ScopeKind::Function,
            "class" | "struct" => return ScopeKind::Class,
            "namespace" => return ScopeKind::Namespace,
            ";" | "{" | "}" => break,
            _ => {}
        }
        if CONTROL_KEYWORDS.contains(&text.as_str()) {
            return ScopeKind::Block;
        }
        cur = list.prev(id);
    }
    ScopeKind::Block
}

fn is_declaration_start(list: &TokenList, id: TokenId) -> bool {
    let tok = list.get(id);
    if tok.kind != TokenKind::Keyword && tok.kind != TokenKind::Identifier {
        return false;
    }
    if CONTROL_KEYWORDS.contains(&tok.text.as_str()) || matches!(tok.text.as_str(), "return" | "break" | "continue" | "do" | "else") {
        return false;
    }
    let after_boundary = match list.prev(id) {
        None => true,
        Some(p) => matches!(list.get(p).text.as_str(), ";" | "{" | "}"),
    };
    after_boundary && (DECL_STARTERS.contains(&tok.text.as_str()) || tok.kind == TokenKind::Identifier)
}

/// Try to parse `[type tokens] [*|&]* name (` (function) or `[type tokens]
/// [*|&]* name ;`/`=` (variable) starting at `start`. Returns the last
/// token of the declaration (so the caller can skip past it) plus whether
/// anything was registered.
fn try_register_declaration(list: &TokenList, db: &mut SymbolDatabase, scope: ScopeId, start: TokenId) -> Option<(TokenId, DeclKind)> {
    let mut type_tokens = Vec::new();
    let mut cur = Some(start);
    let mut pointer = false;
    let mut reference = false;
    let mut name: Option<TokenId> = None;

    while let Some(id) = cur {
        let tok = list.get(id);
        match tok.kind {
            TokenKind::Keyword if DECL_STARTERS.contains(&tok.text.as_str()) => {
                type_tokens.push(tok.text.clone());
                cur = list.next(id);
            }
            TokenKind::Identifier if name.is_none() && type_tokens.is_empty() => {
                type_tokens.push(tok.text.clone());
                cur = list.next(id);
            }
            TokenKind::Operator if tok.text == "*" => {
                pointer = true;
                cur = list.next(id);
            }
            TokenKind::Operator if tok.text == "&" => {
                reference = true;
                cur = list.next(id);
            }
            TokenKind::Identifier if name.is_none() => {
                name = Some(id);
                cur = list.next(id);
                break;
            }
            _ => return None,
        }
    }

    let name_id = name?;
    let type_name = if type_tokens.is_empty() {
        "int".to_string()
    } else {
        type_tokens.join(" ")
    };
    let next = list.next(name_id)?;

    if list.get(next).text == "(" {
        let close_paren = list.link(next)?;
        let param_specs = parse_parameters(list, next, close_paren);

        let func_id = FunctionId::from_index(db.functions.len());
        db.functions.push(Function {
            name: list.get(name_id).text.clone(),
            scope,
            body_scope: None,
            declaration: name_id,
            parameters: Vec::new(),
            return_type: type_name,
            is_static: false,
            param_specs,
        });
        db.scopes[scope.index()].functions.push(func_id);

        return Some((close_paren, DeclKind::Function(func_id)));
    }

    let mut array_dimensions = Vec::new();
    let mut after_dims = next;
    while list.get(after_dims).text == "[" {
        let Some(close) = list.link(after_dims) else { break };
        let dim = list.next(after_dims).filter(|&d| d != close).and_then(|d| list.get(d).text.parse::<i64>().ok());
        array_dimensions.push(dim);
        after_dims = match list.next(close) {
            Some(n) => n,
            None => break,
        };
    }

    if matches!(list.get(after_dims).text.as_str(), ";" | "=" | ",") {
        let var_id = VariableId::from_index(db.variables.len());
        db.variables.push(Variable {
            name: list.get(name_id).text.clone(),
            scope,
            declaration: name_id,
            type_name,
            is_pointer: pointer,
            is_reference: reference,
            is_parameter: false,
            is_array: !array_dimensions.is_empty(),
            array_dimensions,
            is_local: matches!(db.scope(scope).kind, ScopeKind::Function | ScopeKind::Block),
        });
        db.scopes[scope.index()].variables.push(var_id);
        return Some((name_id, DeclKind::Variable(var_id)));
    }

    None
}

/// Parse the parameter list between `open_paren` and `close_paren` into one
/// [`ParamSpec`] per comma-separated, named parameter (`spec.md` §4.4
/// parameter recovery). `(void)` and unnamed parameters (prototypes that
/// never get a body anyway) yield no spec for that slot.
fn parse_parameters(list: &TokenList, open_paren: TokenId, close_paren: TokenId) -> Vec<ParamSpec> {
    let mut specs = Vec::new();
    let mut segment: Vec<TokenId> = Vec::new();
    let mut depth = 0i32;
    let mut cur = list.next(open_paren);

    while let Some(id) = cur {
        if id == close_paren && depth == 0 {
            break;
        }
        let tok = list.get(id);
        if tok.is_opening_bracket() {
            depth += 1;
            segment.push(id);
        } else if tok.is_closing_bracket() {
            depth -= 1;
            segment.push(id);
        } else if tok.text == "," && depth == 0 {
            if let Some(spec) = parse_one_parameter(list, &segment) {
                specs.push(spec);
            }
            segment.clear();
        } else {
            segment.push(id);
        }
        cur = list.next(id);
    }
    if let Some(spec) = parse_one_parameter(list, &segment) {
        specs.push(spec);
    }
    specs
}

/// A parameter declarator is `[type tokens] [*|&]* name`; the last
/// identifier/keyword before the end of the segment is the name, everything
/// before it is the type.
fn parse_one_parameter(list: &TokenList, segment: &[TokenId]) -> Option<ParamSpec> {
    if segment.is_empty() || (segment.len() == 1 && list.get(segment[0]).text == "void") {
        return None;
    }

    let mut type_tokens = Vec::new();
    let mut pointer = false;
    let mut reference = false;
    let mut name_token: Option<TokenId> = None;

    for &id in segment {
        let tok = list.get(id);
        match tok.text.as_str() {
            "*" => pointer = true,
            "&" => reference = true,
            "const" | "volatile" => {}
            _ if tok.kind == TokenKind::Identifier || tok.kind == TokenKind::Keyword => {
                if let Some(prev_name) = name_token.replace(id) {
                    type_tokens.push(list.get(prev_name).text.clone());
                }
            }
            _ => {}
        }
    }

    let name_token = name_token?;
    Some(ParamSpec {
        name: list.get(name_token).text.clone(),
        name_token,
        type_name: if type_tokens.is_empty() { "int".to_string() } else { type_tokens.join(" ") },
        is_pointer: pointer,
        is_reference: reference,
    })
}

/// Stamp `variable_ref` on every identifier token that resolves to a known
/// variable, given the already-built [`SymbolDatabase`]. Split out from
/// `build` because the database needs the token list read-only first and
/// the token list needs to be writable second.
pub fn stamp_references(list: &mut crate::token::TokenList, db: &SymbolDatabase) {
    let mut scope_of_token: HashMap<TokenId, ScopeId> = HashMap::new();
    let mut scope_stack = vec![db.global_scope()];
    let mut cur = list.tokens();
    while let Some(id) = cur {
        let text = list.get(id).text.clone();
        if text == "{" {
            if let Some(&child) = db
                .scope(*scope_stack.last().unwrap())
                .children
                .iter()
                .find(|&&c| db.scope(c).open == Some(id))
            {
                scope_stack.push(child);
            }
        } else if text == "}" && scope_stack.len() > 1 {
            scope_stack.pop();
        }
        scope_of_token.insert(id, *scope_stack.last().unwrap());
        cur = list.next(id);
    }

    let ids: Vec<TokenId> = list.iter().collect();
    for &id in &ids {
        let scope = *scope_of_token.get(&id).unwrap_or(&db.global_scope());
        list.get_mut(id).scope_ref = Some(scope);
    }

    for id in ids {
        if list.get(id).kind != TokenKind::Identifier {
            continue;
        }
        let scope = *scope_of_token.get(&id).unwrap_or(&db.global_scope());
        let name = list.get(id).text.clone();
        if let Some(v) = db.resolve_variable(scope, &name) {
            list.get_mut(id).variable_ref = Some(v);
        }
        if let Some(f) = db.resolve_function(scope, &name) {
            list.get_mut(id).function_ref = Some(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileIndex;
    use crate::token::Token;
    use std::path::PathBuf;

    fn build_list(texts: &[(&str, TokenKind)]) -> TokenList {
        let toks = texts
            .iter()
            .map(|(t, k)| Token::new(*t, *k, FileIndex::PRIMARY, 1, 1))
            .collect();
        TokenList::from_tokens(vec![PathBuf::from("a.c")], toks).0
    }

    #[test]
    fn registers_global_variable() {
        let list = build_list(&[
            ("int", TokenKind::Keyword),
            ("x", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
        ]);
        let db = build(&list);
        assert_eq!(db.variables.len(), 1);
        assert_eq!(db.variables[0].name, "x");
        assert!(!db.variables[0].is_pointer);
    }

    #[test]
    fn registers_function_and_opens_body_scope() {
        let list = build_list(&[
            ("int", TokenKind::Keyword),
            ("f", TokenKind::Identifier),
            ("(", TokenKind::Punctuator),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        let db = build(&list);
        assert_eq!(db.functions.len(), 1);
        assert_eq!(db.functions[0].name, "f");
        // global + function-body scope
        assert_eq!(db.scopes.len(), 2);
        assert_eq!(db.scopes[1].kind, ScopeKind::Function);
        assert_eq!(db.functions[0].body_scope, Some(ScopeId::from_index(1)));
    }

    #[test]
    fn prototype_without_body_has_no_body_scope() {
        let list = build_list(&[
            ("int", TokenKind::Keyword),
            ("f", TokenKind::Identifier),
            ("(", TokenKind::Punctuator),
            (")", TokenKind::Punctuator),
            (";", TokenKind::Punctuator),
        ]);
        let db = build(&list);
        assert_eq!(db.functions.len(), 1);
        assert_eq!(db.functions[0].body_scope, None);
        assert!(db.functions[0].parameters.is_empty());
        // only the global scope was ever created
        assert_eq!(db.scopes.len(), 1);
    }

    #[test]
    fn registers_pointer_parameter_as_variable_in_body_scope() {
        let list = build_list(&[
            ("void", TokenKind::Keyword),
            ("use", TokenKind::Identifier),
            ("(", TokenKind::Punctuator),
            ("int", TokenKind::Keyword),
            ("*", TokenKind::Operator),
            ("p", TokenKind::Identifier),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        let db = build(&list);
        assert_eq!(db.functions[0].parameters.len(), 1);
        let param = db.variable(db.functions[0].parameters[0]);
        assert_eq!(param.name, "p");
        assert_eq!(param.type_name, "int");
        assert!(param.is_pointer);
        assert!(param.is_parameter);
        assert_eq!(param.scope, db.functions[0].body_scope.unwrap());
    }

    #[test]
    fn resolves_variable_reference_in_nested_scope() {
        let mut list = build_list(&[
            ("int", TokenKind::Keyword),
            ("f", TokenKind::Identifier),
            ("(", TokenKind::Punctuator),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("int", TokenKind::Keyword),
            ("x", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("x", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        let db = build(&list);
        stamp_references(&mut list, &db);

        let ids: Vec<TokenId> = list.iter().collect();
        let second_x = ids
            .iter()
            .filter(|&&id| list.get(id).text == "x")
            .nth(1)
            .copied()
            .unwrap();
        assert!(list.get(second_x).variable_ref.is_some());
    }
}
