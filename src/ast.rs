use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use enumflags2::BitFlags;


// Abstract over the host compiler's node allocation strategy.
pub type Node<T> = Rc<T>;
pub type Seq<T> = Vec<Node<T>>;
pub type AList<T> = Vec<(String, Node<T>)>;


// Keyword types of the surface language.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Str,
    Num,
    Bool,
    BigInt,
    Void,
    Null,
    Undefined,
    Any,
}


// Literal type operands. Null gets its own keyword opcode downstream,
// but it still parses as a literal type node.
#[derive(Clone, Debug, PartialEq)]
pub enum Lit {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}


// Member modifiers as the host exposes them. Optional is a separate
// token in the grammar and is carried as a bool on the member.
#[derive(BitFlags, Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Modifier {
    Static    = 0b0001,
    Private   = 0b0010,
    Protected = 0b0100,
    Abstract  = 0b1000,
}

pub type Mods = BitFlags<Modifier>;


// A callable parameter. Parameters without an annotation exist in the
// source but contribute nothing to reflection.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<Node<TypeNode>>,
}


// ADT for type positions.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeNode {
    Prim(Primitive),
    Lit(Lit),
    Array(Node<TypeNode>),
    Union(Seq<TypeNode>),
    Intersection(Seq<TypeNode>),
    Object(Seq<Member>),
    Ref { name: String, args: Seq<TypeNode> },
    Function { params: Vec<Param>, ret: Option<Node<TypeNode>> },
    Index { key: Option<Node<TypeNode>>, value: Node<TypeNode> },
    Paren(Node<TypeNode>),
    Query(String),
    Mapped,
}


// Members of interfaces and object type literals.
#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Property {
        name: String,
        ty: Option<Node<TypeNode>>,
        optional: bool,
    },
    Method {
        name: String,
        params: Vec<Param>,
        ret: Option<Node<TypeNode>>,
    },
    Index {
        key: Option<Node<TypeNode>>,
        value: Node<TypeNode>,
    },
}

impl Member {
    // The declared name, used for shadowing checks across extends
    // clauses. Index signatures are unnamed and never shadow.
    pub fn name(&self) -> Option<&str> {
        match self {
            Member::Property { name, .. } => Some(name),
            Member::Method { name, .. } => Some(name),
            Member::Index { .. } => None,
        }
    }
}


// Members of class bodies.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassMember {
    Property {
        name: String,
        ty: Option<Node<TypeNode>>,
        optional: bool,
        mods: Mods,
        init: Option<Node<Expr>>,
        doc: Option<String>,
    },
    Method {
        name: String,
        params: Vec<Param>,
        ret: Option<Node<TypeNode>>,
        mods: Mods,
        doc: Option<String>,
    },
    Constructor {
        params: Vec<Param>,
        doc: Option<String>,
    },
}

impl ClassMember {
    pub fn name(&self) -> &str {
        match self {
            ClassMember::Property { name, .. } => name,
            ClassMember::Method { name, .. } => name,
            ClassMember::Constructor { .. } => "constructor",
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            ClassMember::Property { doc, .. } => doc.as_deref(),
            ClassMember::Method { doc, .. } => doc.as_deref(),
            ClassMember::Constructor { doc, .. } => doc.as_deref(),
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            ClassMember::Property { mods, .. } => mods.contains(Modifier::Static),
            ClassMember::Method { mods, .. } => mods.contains(Modifier::Static),
            ClassMember::Constructor { .. } => false,
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<ClassMember>,
    pub exported: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub extends: Vec<String>,
    pub members: Seq<Member>,
    pub exported: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AliasDecl {
    pub name: String,
    pub ty: Node<TypeNode>,
    pub exported: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub is_const: bool,
    pub exported: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Node<TypeNode>>,
    pub exported: bool,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub init: Node<Expr>,
    pub exported: bool,
    pub doc: Option<String>,
}


// One name bound by an import statement. The synthesized flag is the
// host's elision override: imports used only in type positions are
// normally pruned from emitted output, and the resolver sets the flag
// to keep the value import alive for lazy references.
#[derive(Debug)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
    pub module: String,
    pub synthesized: Cell<bool>,
}

impl ImportSpecifier {
    pub fn new(imported: &str, local: &str, module: &str) -> ImportSpecifier {
        ImportSpecifier {
            imported: imported.to_string(),
            local: local.to_string(),
            module: module.to_string(),
            synthesized: Cell::new(false),
        }
    }
}

#[derive(Debug)]
pub struct ImportDecl {
    pub module: String,
    pub specifiers: Seq<ImportSpecifier>,
}

// export { x [as y] } from 'm'  /  export * from 'm'
#[derive(Clone, Debug, PartialEq)]
pub enum Reexport {
    Named {
        module: String,
        // (source-side name, optional rename)
        entries: Vec<(String, Option<String>)>,
    },
    Star {
        module: String,
    },
}


#[derive(Clone, Debug)]
pub enum Declaration {
    Class(Node<ClassDecl>),
    Interface(Node<InterfaceDecl>),
    Alias(Node<AliasDecl>),
    Enum(Node<EnumDecl>),
    Function(Node<FunctionDecl>),
    Var(Node<VarDecl>),
    ImportSpec(Node<ImportSpecifier>),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Class(d) => &d.name,
            Declaration::Interface(d) => &d.name,
            Declaration::Alias(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::Function(d) => &d.name,
            Declaration::Var(d) => &d.name,
            Declaration::ImportSpec(s) => &s.local,
        }
    }
}


#[derive(Clone, Debug)]
pub enum Item {
    Decl(Declaration),
    Import(Node<ImportDecl>),
    Reexport(Node<Reexport>),
    // Synthesized post-statements, e.g. `f.__type = ...`.
    Stmt(Node<Expr>),
}


#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub items: Vec<Item>,
    pub doc: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, items: Vec<Item>) -> SourceFile {
        SourceFile { path: path.into(), items, doc: None }
    }
}


// ADT for value expressions: the anonymous callables the transformer
// wraps, plus every node shape the decorator synthesizes.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Id(String),
    Dot(Node<Expr>, String),
    Array(Seq<Expr>),
    Object(AList<Expr>),
    Call(Node<Expr>, Seq<Expr>),
    Assign(Node<Expr>, Node<Expr>),
    Arrow {
        params: Vec<Param>,
        ret: Option<Node<TypeNode>>,
        body: Option<Node<Expr>>,
    },
    Function {
        params: Vec<Param>,
        ret: Option<Node<TypeNode>>,
    },
}

// The node factory the host exposes for synthesizing output.
impl Expr {
    pub fn str(value: &str) -> Node<Expr> {
        Node::new(Expr::Str(value.to_string()))
    }

    pub fn id(name: &str) -> Node<Expr> {
        Node::new(Expr::Id(name.to_string()))
    }

    pub fn dot(target: &Node<Expr>, field: &str) -> Node<Expr> {
        Node::new(Expr::Dot(target.clone(), field.to_string()))
    }

    pub fn array(items: Seq<Expr>) -> Node<Expr> {
        Node::new(Expr::Array(items))
    }

    pub fn object(fields: AList<Expr>) -> Node<Expr> {
        Node::new(Expr::Object(fields))
    }

    pub fn call(callee: Node<Expr>, args: Seq<Expr>) -> Node<Expr> {
        Node::new(Expr::Call(callee, args))
    }

    pub fn assign(target: Node<Expr>, value: Node<Expr>) -> Node<Expr> {
        Node::new(Expr::Assign(target, value))
    }

    // A zero-argument closure over an identifier: the evaluation handle
    // handed to runtime consumers for classes and enums.
    pub fn thunk(name: &str) -> Node<Expr> {
        Node::new(Expr::Arrow {
            params: vec![],
            ret: None,
            body: Some(Expr::id(name)),
        })
    }
}
