// A thin model of the host compiler's semantic surface: just enough to
// answer symbol-at-location and declared-type-of-symbol queries, and to
// resolve module specifiers to source files for the resolver's
// re-export traversal.

use crate::ast::{Declaration, ImportSpecifier, Item, Node, SourceFile};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;


// Every source file taking part in the compilation, keyed by path.
pub struct Project {
    files: HashMap<PathBuf, Node<SourceFile>>,
}

impl Project {
    pub fn new() -> Project {
        Project { files: HashMap::new() }
    }

    pub fn add(&mut self, file: SourceFile) -> Node<SourceFile> {
        let node = Node::new(file);
        self.files.insert(node.path.clone(), node.clone());
        node
    }

    pub fn get(&self, path: &Path) -> Option<Node<SourceFile>> {
        self.files.get(path).cloned()
    }

    // Resolve a module specifier against the importing file: relative
    // specifiers join onto the importer's directory, anything else is
    // taken as a project-absolute key.
    pub fn resolve_module(
        &self,
        from: &Path,
        specifier: &str,
    ) -> Option<Node<SourceFile>> {
        let target = if specifier.starts_with('.') {
            let base = from.parent().unwrap_or_else(|| Path::new(""));
            normalize(&base.join(specifier))
        } else {
            PathBuf::from(specifier)
        };
        self.files.get(&target).cloned()
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}


// What a name binds to in a file's top-level scope.
#[derive(Clone, Debug, Default)]
pub struct Symbol {
    pub declarations: Vec<Declaration>,
}


struct FileTable {
    symbols: HashMap<String, Symbol>,
    exports: HashMap<String, Declaration>,
}

impl FileTable {
    fn build(file: &SourceFile) -> FileTable {
        let mut symbols: HashMap<String, Symbol> = HashMap::new();
        let mut exports = HashMap::new();

        let mut bind = |name: &str, decl: Declaration| {
            symbols
                .entry(name.to_string())
                .or_default()
                .declarations
                .push(decl);
        };

        for item in &file.items {
            match item {
                Item::Decl(decl) => {
                    bind(decl.name(), decl.clone());
                    if is_exported(decl) {
                        exports.insert(decl.name().to_string(), decl.clone());
                    }
                }
                Item::Import(import) => {
                    for spec in &import.specifiers {
                        bind(&spec.local, Declaration::ImportSpec(spec.clone()));
                    }
                }
                Item::Reexport(_) | Item::Stmt(_) => {}
            }
        }

        FileTable { symbols, exports }
    }
}

fn is_exported(decl: &Declaration) -> bool {
    match decl {
        Declaration::Class(d) => d.exported,
        Declaration::Interface(d) => d.exported,
        Declaration::Alias(d) => d.exported,
        Declaration::Enum(d) => d.exported,
        Declaration::Function(d) => d.exported,
        Declaration::Var(d) => d.exported,
        Declaration::ImportSpec(_) => false,
    }
}


// Symbol tables are built lazily, at most once per source file, and
// live for the duration of the pass.
pub struct Checker<'p> {
    project: &'p Project,
    tables: RefCell<HashMap<PathBuf, Rc<FileTable>>>,
}

impl<'p> Checker<'p> {
    pub fn new(project: &'p Project) -> Checker<'p> {
        Checker { project, tables: RefCell::new(HashMap::new()) }
    }

    pub fn project(&self) -> &Project {
        self.project
    }

    fn table(&self, file: &Node<SourceFile>) -> Rc<FileTable> {
        if let Some(table) = self.tables.borrow().get(&file.path) {
            return table.clone();
        }
        let table = Rc::new(FileTable::build(file));
        self.tables
            .borrow_mut()
            .insert(file.path.clone(), table.clone());
        table
    }

    // The symbol a simple identifier binds to in this file.
    pub fn symbol_at(
        &self,
        file: &Node<SourceFile>,
        name: &str,
    ) -> Option<Symbol> {
        self.table(file).symbols.get(name).cloned()
    }

    // A declaration physically exported by this file under `name`.
    // Re-exports are not followed here; the resolver owns that walk.
    pub fn export_of(
        &self,
        file: &Node<SourceFile>,
        name: &str,
    ) -> Option<Declaration> {
        self.table(file).exports.get(name).cloned()
    }

    // See through an import specifier to the declared type behind it:
    // a direct export of the referenced module, when there is one.
    pub fn declared_type(
        &self,
        file: &Node<SourceFile>,
        spec: &ImportSpecifier,
    ) -> Option<Declaration> {
        let target = self.project.resolve_module(&file.path, &spec.module)?;
        self.export_of(&target, &spec.imported)
    }
}
