// Compiles type annotations into instruction streams. One extractor
// exists per reflected declaration: it walks the type AST, appends
// opcodes, and interns non-primitive operands on the literal stack.
//
// Type references are the one node kind that needs semantics rather
// than syntax; that half of the walk lives in resolver.rs as a second
// impl block, and the two recurse into each other.

use crate::ast::{
    ClassMember, Expr, Lit, Member, Modifier, Mods, Node, Param, Primitive,
    SourceFile, TypeNode,
};
use crate::bytecode::{Op, PackStruct, StackEntry};
use crate::checker::Checker;
use std::collections::HashMap;


pub struct Extractor<'a> {
    pub(crate) checker: &'a Checker<'a>,
    // The file whose scope names currently resolve in. Swapped while
    // extracting declarations that live in other files.
    pub(crate) file: Node<SourceFile>,
    pub(crate) pack: PackStruct,
    // One thunk node per referenced name, so repeated references to a
    // class or enum share a single literal-stack entry.
    pub(crate) thunks: HashMap<String, Node<Expr>>,
}

impl<'a> Extractor<'a> {
    pub fn new(checker: &'a Checker<'a>, file: &Node<SourceFile>) -> Extractor<'a> {
        Extractor {
            checker,
            file: file.clone(),
            pack: PackStruct::new(),
            thunks: HashMap::new(),
        }
    }

    // The pack for one class member, or None when nothing about the
    // member is reflectable (no annotation, suppressed shape, or a
    // type that extracts to nothing).
    pub fn class_member(
        checker: &'a Checker<'a>,
        file: &Node<SourceFile>,
        member: &ClassMember,
    ) -> Option<PackStruct> {
        let mut ex = Extractor::new(checker, file);
        match member {
            ClassMember::Property { ty: Some(ty), optional, mods, .. } => {
                ex.extract_type(ty);
                if ex.pack.is_empty() {
                    return None;
                }
                ex.pack.emit(Op::Property);
                ex.modifiers(*optional, *mods);
            }
            ClassMember::Property { ty: None, .. } => return None,
            ClassMember::Method { params, ret, mods, .. } => {
                if !ex.callable_types(params, ret.as_ref()) {
                    return None;
                }
                ex.pack.emit(Op::Method);
                ex.modifiers(false, *mods);
            }
            ClassMember::Constructor { params, .. } => {
                if !ex.callable_types(params, None) {
                    return None;
                }
                ex.pack.emit(Op::Method);
            }
        }
        Some(ex.pack)
    }

    // The pack for a free callable: a function declaration, function
    // expression, or arrow.
    pub fn function(
        checker: &'a Checker<'a>,
        file: &Node<SourceFile>,
        params: &[Param],
        ret: Option<&Node<TypeNode>>,
    ) -> Option<PackStruct> {
        let mut ex = Extractor::new(checker, file);
        if !ex.callable_types(params, ret) {
            return None;
        }
        ex.pack.emit(Op::Function);
        Some(ex.pack)
    }

    // Parameter and return types for any callable shape. False when
    // there is nothing to reflect: no parameters and no explicit
    // return annotation.
    pub(crate) fn callable_types(
        &mut self,
        params: &[Param],
        ret: Option<&Node<TypeNode>>,
    ) -> bool {
        if params.is_empty() && ret.is_none() {
            return false;
        }
        for param in params {
            if let Some(ty) = &param.ty {
                self.extract_type(ty);
            }
        }
        match ret {
            Some(ty) => self.extract_type(ty),
            None => self.pack.emit(Op::Any),
        }
        true
    }

    // Modifier opcodes decorate the member op just emitted, in fixed
    // order: optional, private, protected, abstract.
    fn modifiers(&mut self, optional: bool, mods: Mods) {
        if optional {
            self.pack.emit(Op::Optional);
        }
        if mods.contains(Modifier::Private) {
            self.pack.emit(Op::Private);
        }
        if mods.contains(Modifier::Protected) {
            self.pack.emit(Op::Protected);
        }
        if mods.contains(Modifier::Abstract) {
            self.pack.emit(Op::Abstract);
        }
    }

    pub fn extract_type(&mut self, ty: &TypeNode) {
        match ty {
            TypeNode::Paren(inner) => self.extract_type(inner),
            TypeNode::Prim(p) => self.pack.emit(primitive_op(*p)),
            TypeNode::Lit(lit) => self.literal(lit),
            TypeNode::Array(element) => {
                self.extract_type(element);
                self.pack.emit(Op::Array);
            }
            TypeNode::Union(members) => self.aggregate(members, Op::Union),
            TypeNode::Intersection(members) => {
                self.aggregate(members, Op::Intersection)
            }
            TypeNode::Object(members) => {
                let members: Vec<_> = members
                    .iter()
                    .map(|m| (m.clone(), self.file.clone()))
                    .collect();
                self.object(&members);
            }
            TypeNode::Ref { name, args } => self.reference(name, args),
            TypeNode::Function { params, ret } => {
                if self.callable_types(params, ret.as_ref()) {
                    self.pack.emit(Op::Function);
                }
            }
            TypeNode::Index { key, value } => {
                self.index_signature(key.as_ref(), value)
            }
            // Mapped types are not evaluated; the member is omitted
            // upstream when its type extracted to nothing.
            TypeNode::Mapped => {}
            // No reduction for queries; reflect as any.
            TypeNode::Query(_) => self.pack.emit(Op::Any),
        }
    }

    // Unions and intersections consume the current frame. A frame
    // boundary is only opened when prior opcodes exist to protect.
    fn aggregate(&mut self, members: &[Node<TypeNode>], op: Op) {
        match members.len() {
            0 => {}
            1 => self.extract_type(&members[0]),
            _ => {
                if !self.pack.ops.is_empty() {
                    self.pack.emit(Op::Frame);
                }
                for member in members {
                    self.extract_type(member);
                }
                self.pack.emit(op);
            }
        }
    }

    fn literal(&mut self, lit: &Lit) {
        let entry = match lit {
            Lit::Null => {
                self.pack.emit(Op::Null);
                return;
            }
            Lit::Str(s) => StackEntry::Str(s.clone()),
            Lit::Num(n) => StackEntry::Num(*n),
            Lit::Bool(b) => StackEntry::Bool(*b),
        };
        match self.pack.intern(entry) {
            Some(index) => self.pack.emit_with(Op::Literal, index),
            // Stack exhausted; recover without a representable index.
            None => self.pack.emit(Op::Any),
        }
    }

    // A flattened member list (each member paired with the file it was
    // declared in) collapses to one structural type.
    pub(crate) fn object(&mut self, members: &[(Node<Member>, Node<SourceFile>)]) {
        for (member, origin) in members {
            self.in_file(origin, |ex| ex.signature(member));
        }
        self.pack.emit(Op::ObjectLiteral);
    }

    fn signature(&mut self, member: &Member) {
        match member {
            Member::Property { name, ty: Some(ty), .. } => {
                self.named_signature(Op::PropertySignature, name, |ex| {
                    ex.extract_type(ty);
                    true
                });
            }
            Member::Property { ty: None, .. } => {}
            Member::Method { name, params, ret } => {
                self.named_signature(Op::MethodSignature, name, |ex| {
                    ex.callable_types(params, ret.as_ref())
                });
            }
            Member::Index { key, value } => {
                self.index_signature(key.as_ref(), value)
            }
        }
    }

    // Emit a named member: intern the name, run the body, then the
    // signature op carrying the name's index. If the body emitted
    // nothing the member is dropped and the name entry rolled back —
    // safe because an empty emission interns nothing.
    fn named_signature<F>(&mut self, op: Op, name: &str, body: F)
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let stack_mark = self.pack.stack.len();
        let index = match self.pack.intern(StackEntry::Str(name.to_string())) {
            Some(index) => index,
            None => return,
        };
        let ops_mark = self.pack.ops.len();
        if !body(self) || self.pack.ops.len() == ops_mark {
            self.pack.stack.truncate(stack_mark);
            return;
        }
        self.pack.emit_with(op, index);
    }

    fn index_signature(
        &mut self,
        key: Option<&Node<TypeNode>>,
        value: &Node<TypeNode>,
    ) {
        match key {
            Some(ty) => self.extract_type(ty),
            None => self.pack.emit(Op::Any),
        }
        self.extract_type(value);
        self.pack.emit(Op::IndexSignature);
    }

    // Run `body` with names resolving in another file's scope.
    pub(crate) fn in_file<F, R>(&mut self, origin: &Node<SourceFile>, body: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let previous = std::mem::replace(&mut self.file, origin.clone());
        let result = body(self);
        self.file = previous;
        result
    }

    // The shared evaluation handle for a referenced class or enum.
    pub(crate) fn thunk(&mut self, name: &str) -> Node<Expr> {
        self.thunks
            .entry(name.to_string())
            .or_insert_with(|| Expr::thunk(name))
            .clone()
    }
}

fn primitive_op(p: Primitive) -> Op {
    match p {
        Primitive::Str => Op::String,
        Primitive::Num => Op::Number,
        Primitive::Bool => Op::Boolean,
        Primitive::BigInt => Op::BigInt,
        Primitive::Void => Op::Void,
        Primitive::Null => Op::Null,
        Primitive::Undefined => Op::Undefined,
        Primitive::Any => Op::Any,
    }
}
