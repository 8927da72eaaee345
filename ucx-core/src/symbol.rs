use crate::ast::{Class, Function};
use crate::library::LibraryIndex;
use crate::token::Token;
use crate::workspace::Workspace;
use lsp_types::Url;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a definition was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOrigin {
    Document(Url),
    Library(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Parameter,
    Local,
    Variable,
    Function,
    Constant,
    Enum,
    EnumValue,
    Struct,
    State,
    Class,
}

/// A resolved declaration.
///
/// `index` points back into the owning list: the parameter list of the
/// enclosing function for parameters, the function's locals in source order,
/// or the class list matching `kind` (`enums` for enum values). It is `0` for
/// classes.
#[derive(Debug, Clone)]
pub struct DefinitionSite {
    pub origin: SymbolOrigin,
    pub class: Arc<Class>,
    pub kind: DefinitionKind,
    pub name: Token,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub enum Definition {
    Found(DefinitionSite),
    NotFound,
    /// Nothing matched, but the library is still loading so a later query
    /// might succeed.
    Inconclusive,
}

impl Definition {
    pub fn is_found(&self) -> bool {
        matches!(self, Definition::Found(_))
    }

    pub fn site(&self) -> Option<&DefinitionSite> {
        match self {
            Definition::Found(site) => Some(site),
            Definition::NotFound | Definition::Inconclusive => None,
        }
    }
}

/// A token located in a document, with enough context to resolve it.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub uri: Url,
    pub token: Token,
    pub class: Arc<Class>,
    /// Index into `class.functions` of the function whose body holds the token.
    pub function_index: Option<usize>,
}

impl TokenInfo {
    pub fn function(&self) -> Option<&Function> {
        self.function_index.and_then(|i| self.class.functions.get(i))
    }
}

/// Cross-document symbol lookups over the open documents and the library.
pub struct SymbolDatabase {
    workspace: Workspace,
    library: Arc<LibraryIndex>,
}

impl SymbolDatabase {
    pub fn new(library: Arc<LibraryIndex>) -> Self {
        Self::with_workspace(Workspace::new(), library)
    }

    pub fn with_workspace(workspace: Workspace, library: Arc<LibraryIndex>) -> Self {
        Self { workspace, library }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn library(&self) -> &Arc<LibraryIndex> {
        &self.library
    }

    pub fn get_ast(&mut self, uri: &Url) -> Option<Arc<Class>> {
        self.workspace.get_ast(uri)
    }

    /// Reparse invalidated documents so class lookups see current text.
    pub fn refresh(&mut self) {
        self.workspace.refresh();
    }

    /// Locate the token at a position in the current text of `uri`.
    pub fn find_token(&mut self, uri: &Url, line: u32, column: u32) -> Option<TokenInfo> {
        let ast = self.workspace.get_ast(uri)?;
        Self::token_at(uri, &ast, line, column)
    }

    /// Locate the token at a position in a given AST.
    pub fn token_at(uri: &Url, ast: &Arc<Class>, line: u32, column: u32) -> Option<TokenInfo> {
        let token = ast.token_at(line, column)?.clone();
        let function_index = ast
            .function_at(token.line, token.position)
            .map(|(index, _)| index);
        Some(TokenInfo {
            uri: uri.clone(),
            token,
            class: Arc::clone(ast),
            function_index,
        })
    }

    /// Resolve a token to its declaration.
    ///
    /// Searches the enclosing function, the owning class, its ancestors
    /// nearest first, and finally class names. Class-name lookups only run
    /// once the library is loaded; until then an unmatched name is
    /// [`Definition::Inconclusive`].
    pub fn find_definition(&self, info: &TokenInfo) -> Definition {
        let token = &info.token;
        if token.is_keyword() || !token.is_word() || token.text.chars().count() <= 1 {
            return Definition::NotFound;
        }
        let name = token.text_lower.as_str();
        let own_origin = SymbolOrigin::Document(info.uri.clone());

        if let Some(function) = info.function() {
            if let Some(site) = search_function(&own_origin, &info.class, function, name) {
                return Definition::Found(site);
            }
        }

        if let Some(site) = search_class(&own_origin, &info.class, name) {
            return Definition::Found(site);
        }

        let mut visited: HashSet<String> = HashSet::new();
        if let Some(own) = info.class.name_lower() {
            visited.insert(own.to_owned());
        }
        let mut parent = info.class.parent_lower().map(str::to_owned);
        while let Some(parent_name) = parent.take() {
            if !visited.insert(parent_name.clone()) {
                debug!("Inheritance cycle at {}", parent_name);
                break;
            }
            let Some((origin, ancestor)) = self.lookup_class(&parent_name) else {
                break;
            };
            if let Some(site) = search_class(&origin, &ancestor, name) {
                return Definition::Found(site);
            }
            parent = ancestor.parent_lower().map(str::to_owned);
        }

        if !self.library.is_loaded() {
            return Definition::Inconclusive;
        }

        match self.lookup_class(name) {
            Some((origin, class)) => match class.name.clone() {
                Some(class_name) => Definition::Found(DefinitionSite {
                    origin,
                    class,
                    kind: DefinitionKind::Class,
                    name: class_name,
                    index: 0,
                }),
                None => Definition::NotFound,
            },
            None => Definition::NotFound,
        }
    }

    /// Workspace classes shadow library classes of the same name.
    fn lookup_class(&self, name_lower: &str) -> Option<(SymbolOrigin, Arc<Class>)> {
        if let Some((uri, class)) = self.workspace.find_class(name_lower) {
            return Some((SymbolOrigin::Document(uri), class));
        }
        self.library.get(name_lower).map(|entry| {
            (
                SymbolOrigin::Library(entry.path.clone()),
                Arc::clone(&entry.class),
            )
        })
    }
}

fn search_function(
    origin: &SymbolOrigin,
    class: &Arc<Class>,
    function: &Function,
    name: &str,
) -> Option<DefinitionSite> {
    let site = |kind, token: &Token, index| DefinitionSite {
        origin: origin.clone(),
        class: Arc::clone(class),
        kind,
        name: token.clone(),
        index,
    };

    for (index, param) in function.params.iter().enumerate() {
        if let Some(param_name) = param.name.as_ref().filter(|t| t.text_lower == name) {
            return Some(site(DefinitionKind::Parameter, param_name, index));
        }
    }

    for (index, local) in function.locals().enumerate() {
        if let Some(local_name) = local.names.iter().find(|t| t.text_lower == name) {
            return Some(site(DefinitionKind::Local, local_name, index));
        }
    }

    None
}

fn search_class(origin: &SymbolOrigin, class: &Arc<Class>, name: &str) -> Option<DefinitionSite> {
    let site = |kind, token: &Token, index| {
        Some(DefinitionSite {
            origin: origin.clone(),
            class: Arc::clone(class),
            kind,
            name: token.clone(),
            index,
        })
    };

    if let Some((i, v)) = find_named(&class.variables, |v| Some(&v.name), name) {
        return site(DefinitionKind::Variable, &v.name, i);
    }
    if let Some((i, f)) = find_named(&class.functions, |f| f.name.as_ref(), name) {
        if let Some(token) = &f.name {
            return site(DefinitionKind::Function, token, i);
        }
    }
    if let Some((i, c)) = find_named(&class.constants, |c| Some(&c.name), name) {
        return site(DefinitionKind::Constant, &c.name, i);
    }
    for (i, declaration) in class.enums.iter().enumerate() {
        if declaration.name.text_lower == name {
            return site(DefinitionKind::Enum, &declaration.name, i);
        }
        if let Some(value) = declaration.values.iter().find(|v| v.text_lower == name) {
            return site(DefinitionKind::EnumValue, value, i);
        }
    }
    if let Some((i, s)) = find_named(&class.structs, |s| Some(&s.name), name) {
        return site(DefinitionKind::Struct, &s.name, i);
    }
    if let Some((i, s)) = find_named(&class.states, |s| Some(&s.name), name) {
        return site(DefinitionKind::State, &s.name, i);
    }
    if let Some(class_name) = class.name.as_ref().filter(|t| t.text_lower == name) {
        return site(DefinitionKind::Class, class_name, 0);
    }
    None
}

fn find_named<'a, T>(
    items: &'a [T],
    name_of: impl Fn(&T) -> Option<&Token>,
    name: &str,
) -> Option<(usize, &'a T)> {
    items
        .iter()
        .enumerate()
        .find(|(_, item)| name_of(item).is_some_and(|t| t.text_lower == name))
}
