// The per-file pass. Invoked by the host once per compilation unit,
// synchronously: walk declarations, consult the oracle, extract, and
// hand results to the decorator. Classes aggregate per-member packs,
// named functions get a post-assignment, and anonymous callables are
// wrapped where they stand, bottom-up.

use crate::ast::{
    AList, ClassDecl, Declaration, Expr, Item, Node, Param, Seq, SourceFile,
    TypeNode, VarDecl,
};
use crate::bytecode::Packed;
use crate::checker::{Checker, Project};
use crate::decorator;
use crate::extractor::Extractor;
use crate::reflection::{Oracle, ReflectionMode};
use std::sync::atomic::{AtomicBool, Ordering};


static ANNOUNCED: AtomicBool = AtomicBool::new(false);

// One line on standard error, once per process.
fn announce() {
    if !ANNOUNCED.swap(true, Ordering::SeqCst) {
        eprintln!("typepack: reflection transformer active");
    }
}


pub struct Transformer<'p> {
    checker: Checker<'p>,
    oracle: Oracle,
}

impl<'p> Transformer<'p> {
    pub fn new(project: &'p Project) -> Transformer<'p> {
        announce();
        Transformer {
            checker: Checker::new(project),
            oracle: Oracle::new(),
        }
    }

    // The host application can force a mode for the whole session.
    pub fn with_session(
        project: &'p Project,
        mode: ReflectionMode,
    ) -> Transformer<'p> {
        announce();
        Transformer {
            checker: Checker::new(project),
            oracle: Oracle::with_session(mode),
        }
    }

    pub fn transform(&self, file: &Node<SourceFile>) -> Node<SourceFile> {
        let mut items = Vec::with_capacity(file.items.len());
        for item in &file.items {
            match item {
                Item::Decl(Declaration::Class(class)) => {
                    let class = self.class(file, class);
                    items.push(Item::Decl(Declaration::Class(class)));
                }
                Item::Decl(Declaration::Function(func)) => {
                    items.push(item.clone());
                    let docs = [func.doc.as_deref(), file.doc.as_deref()];
                    if let Some(packed) = self.callable_pack(
                        file,
                        &docs,
                        &func.params,
                        func.ret.as_ref(),
                    ) {
                        items.push(Item::Stmt(decorator::function_pack_statement(
                            &func.name, &packed,
                        )));
                    }
                }
                Item::Decl(Declaration::Var(var)) => {
                    let init =
                        self.visit_expr(file, &var.init, var.doc.as_deref());
                    if Node::ptr_eq(&init, &var.init) {
                        items.push(item.clone());
                    } else {
                        items.push(Item::Decl(Declaration::Var(Node::new(
                            VarDecl { init, ..(**var).clone() },
                        ))));
                    }
                }
                other => items.push(other.clone()),
            }
        }
        Node::new(SourceFile {
            path: file.path.clone(),
            items,
            doc: file.doc.clone(),
        })
    }

    fn class(
        &self,
        file: &Node<SourceFile>,
        class: &Node<ClassDecl>,
    ) -> Node<ClassDecl> {
        if decorator::has_type_member(class) {
            return class.clone();
        }
        let mut packs = vec![];
        for member in &class.members {
            if member.is_static() {
                continue;
            }
            let docs =
                [member.doc(), class.doc.as_deref(), file.doc.as_deref()];
            if !self.oracle.mode(&docs, &file.path).enabled() {
                continue;
            }
            if let Some(pack) =
                Extractor::class_member(&self.checker, file, member)
            {
                packs.push((member.name().to_string(), pack.pack()));
            }
        }
        decorator::decorate_class(class, &packs)
    }

    fn callable_pack(
        &self,
        file: &Node<SourceFile>,
        docs: &[Option<&str>],
        params: &[Param],
        ret: Option<&Node<TypeNode>>,
    ) -> Option<Packed> {
        if !self.oracle.mode(docs, &file.path).enabled() {
            return None;
        }
        let pack = Extractor::function(&self.checker, file, params, ret)?;
        Some(pack.pack())
    }

    // Bottom-up expression visit: children first, then wrap any
    // reflectable anonymous callable in place.
    fn visit_expr(
        &self,
        file: &Node<SourceFile>,
        expr: &Node<Expr>,
        doc: Option<&str>,
    ) -> Node<Expr> {
        let rebuilt = self.visit_children(file, expr, doc);
        match &*rebuilt {
            Expr::Arrow { params, ret, .. } | Expr::Function { params, ret } => {
                let docs = [doc, file.doc.as_deref()];
                match self.callable_pack(file, &docs, params, ret.as_ref()) {
                    Some(packed) => {
                        decorator::wrap_expression(&rebuilt, &packed)
                    }
                    None => rebuilt,
                }
            }
            _ => rebuilt,
        }
    }

    fn visit_children(
        &self,
        file: &Node<SourceFile>,
        expr: &Node<Expr>,
        doc: Option<&str>,
    ) -> Node<Expr> {
        match &**expr {
            Expr::Array(items) => {
                let visited: Seq<Expr> = items
                    .iter()
                    .map(|item| self.visit_expr(file, item, doc))
                    .collect();
                if same_nodes(&visited, items) {
                    expr.clone()
                } else {
                    Expr::array(visited)
                }
            }
            Expr::Object(fields) => {
                let visited: AList<Expr> = fields
                    .iter()
                    .map(|(key, value)| {
                        (key.clone(), self.visit_expr(file, value, doc))
                    })
                    .collect();
                let unchanged = visited
                    .iter()
                    .zip(fields)
                    .all(|(a, b)| Node::ptr_eq(&a.1, &b.1));
                if unchanged {
                    expr.clone()
                } else {
                    Expr::object(visited)
                }
            }
            Expr::Call(callee, args) => {
                let new_callee = self.visit_expr(file, callee, doc);
                let new_args: Seq<Expr> = args
                    .iter()
                    .map(|arg| self.visit_expr(file, arg, doc))
                    .collect();
                if Node::ptr_eq(&new_callee, callee) && same_nodes(&new_args, args)
                {
                    expr.clone()
                } else {
                    Expr::call(new_callee, new_args)
                }
            }
            Expr::Assign(target, value) => {
                let new_value = self.visit_expr(file, value, doc);
                if Node::ptr_eq(&new_value, value) {
                    expr.clone()
                } else {
                    Expr::assign(target.clone(), new_value)
                }
            }
            _ => expr.clone(),
        }
    }
}

fn same_nodes(a: &[Node<Expr>], b: &[Node<Expr>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| Node::ptr_eq(x, y))
}
