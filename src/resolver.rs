// Resolution of type references. Known built-ins short-circuit to
// their opcodes; every other identifier follows the checker to its
// originating declaration, through import specifiers and re-export
// chains across files.

use crate::ast::{
    Declaration, ImportSpecifier, InterfaceDecl, Item, Member, Node, Reexport,
    Seq, SourceFile, TypeNode,
};
use crate::bytecode::{Op, StackEntry};
use crate::extractor::Extractor;
use std::collections::HashSet;
use std::path::PathBuf;


// Where an identifier landed: the declaration, the file declaring it,
// and the import specifier consumed on the way, if any.
pub(crate) struct Resolution {
    decl: Declaration,
    origin: Node<SourceFile>,
    import: Option<Node<ImportSpecifier>>,
}


impl<'a> Extractor<'a> {
    pub(crate) fn reference(&mut self, name: &str, args: &Seq<TypeNode>) {
        match name {
            "Date" => self.pack.emit(Op::Date),
            "ArrayBuffer" => self.pack.emit(Op::ArrayBuffer),
            "Int8Array" => self.pack.emit(Op::Int8Array),
            "Uint8Array" => self.pack.emit(Op::Uint8Array),
            "Uint8ClampedArray" => self.pack.emit(Op::Uint8ClampedArray),
            "Int16Array" => self.pack.emit(Op::Int16Array),
            "Uint16Array" => self.pack.emit(Op::Uint16Array),
            "Int32Array" => self.pack.emit(Op::Int32Array),
            "Uint32Array" => self.pack.emit(Op::Uint32Array),
            "Float32Array" => self.pack.emit(Op::Float32Array),
            "Float64Array" => self.pack.emit(Op::Float64Array),
            "BigInt64Array" => self.pack.emit(Op::BigInt64Array),
            "BigUint64Array" => self.pack.emit(Op::BigUint64Array),
            "Promise" => {
                self.type_arg(args, 0);
                self.pack.emit(Op::Promise);
            }
            "Set" => {
                self.type_arg(args, 0);
                self.pack.emit(Op::Set);
            }
            "Map" => {
                self.type_arg(args, 0);
                self.type_arg(args, 1);
                self.pack.emit(Op::Map);
            }
            _ => self.resolved_reference(name, args),
        }
    }

    fn type_arg(&mut self, args: &Seq<TypeNode>, index: usize) {
        match args.get(index) {
            Some(ty) => self.extract_type(ty),
            None => self.pack.emit(Op::Any),
        }
    }

    fn resolved_reference(&mut self, name: &str, args: &Seq<TypeNode>) {
        let file = self.file.clone();
        match self.resolve_name(&file, name) {
            Some(resolution) => self.declaration(resolution, name, args),
            None => self.pack.emit(Op::Any),
        }
    }

    // Follow an identifier to its declaration. An import specifier is
    // first asked for its declared type; failing that, the module
    // graph is searched by hand.
    pub(crate) fn resolve_name(
        &self,
        file: &Node<SourceFile>,
        name: &str,
    ) -> Option<Resolution> {
        let symbol = self.checker.symbol_at(file, name)?;
        match symbol.declarations.first()?.clone() {
            Declaration::ImportSpec(spec) => {
                let target = self
                    .checker
                    .project()
                    .resolve_module(&file.path, &spec.module)?;
                if let Some(decl) = self.checker.declared_type(file, &spec) {
                    return Some(Resolution {
                        decl,
                        origin: target,
                        import: Some(spec),
                    });
                }
                let mut visited = HashSet::new();
                let (decl, origin) =
                    self.find_export(&target, &spec.imported, &mut visited)?;
                Some(Resolution { decl, origin, import: Some(spec) })
            }
            decl => Some(Resolution {
                decl,
                origin: file.clone(),
                import: None,
            }),
        }
    }

    // Search a module's surface for `name`: direct exports first, then
    // re-export chains. A renamed hop recurses with the source-side
    // name, however many hops deep.
    fn find_export(
        &self,
        file: &Node<SourceFile>,
        name: &str,
        visited: &mut HashSet<(PathBuf, String)>,
    ) -> Option<(Declaration, Node<SourceFile>)> {
        if !visited.insert((file.path.clone(), name.to_string())) {
            return None;
        }
        if let Some(decl) = self.checker.export_of(file, name) {
            return Some((decl, file.clone()));
        }
        for item in &file.items {
            let reexport = match item {
                Item::Reexport(reexport) => reexport,
                _ => continue,
            };
            match &**reexport {
                Reexport::Named { module, entries } => {
                    for (source, alias) in entries {
                        let visible = alias.as_deref().unwrap_or(source);
                        if visible != name {
                            continue;
                        }
                        let target = self
                            .checker
                            .project()
                            .resolve_module(&file.path, module);
                        if let Some(target) = target {
                            if let Some(found) =
                                self.find_export(&target, source, visited)
                            {
                                return Some(found);
                            }
                        }
                    }
                }
                Reexport::Star { module } => {
                    let target =
                        self.checker.project().resolve_module(&file.path, module);
                    if let Some(target) = target {
                        if let Some(found) =
                            self.find_export(&target, name, visited)
                        {
                            return Some(found);
                        }
                    }
                }
            }
        }
        None
    }

    fn declaration(
        &mut self,
        resolution: Resolution,
        local: &str,
        args: &Seq<TypeNode>,
    ) {
        let Resolution { decl, origin, import } = resolution;
        match decl {
            Declaration::Alias(alias) => {
                self.in_file(&origin, |ex| ex.extract_type(&alias.ty));
            }
            Declaration::Interface(iface) => {
                let mut seen = HashSet::new();
                let mut visited = HashSet::new();
                let mut members = vec![];
                self.collect_members(
                    &iface,
                    &origin,
                    &mut seen,
                    &mut visited,
                    &mut members,
                );
                self.object(&members);
            }
            Declaration::Enum(decl) => {
                self.preserve(&import);
                if decl.is_const {
                    self.pack.emit(Op::ConstEnum);
                } else {
                    let thunk = self.thunk(local);
                    match self.pack.intern(StackEntry::LazyRef(thunk)) {
                        Some(index) => self.pack.emit_with(Op::Enum, index),
                        None => self.pack.emit(Op::Any),
                    }
                }
            }
            Declaration::Class(_) => {
                self.preserve(&import);
                let thunk = self.thunk(local);
                match self.pack.intern(StackEntry::LazyRef(thunk)) {
                    Some(index) => {
                        for arg in args {
                            self.extract_type(arg);
                        }
                        self.pack.emit_with(Op::Class, index);
                    }
                    None => self.pack.emit(Op::Any),
                }
            }
            Declaration::Function(func) => {
                let emitted = self.in_file(&origin, |ex| {
                    ex.callable_types(&func.params, func.ret.as_ref())
                });
                if emitted {
                    self.pack.emit(Op::Function);
                }
            }
            Declaration::Var(_) | Declaration::ImportSpec(_) => {
                self.pack.emit(Op::Any)
            }
        }
    }

    // Imports consumed for runtime handles must survive the host's
    // unused-import elision.
    fn preserve(&self, import: &Option<Node<ImportSpecifier>>) {
        if let Some(spec) = import {
            spec.synthesized.set(true);
        }
    }

    // Flatten an interface body with its inheritance chain: child
    // members first, then parents' members not yet present. The first
    // declaration of a name wins, so overrides in subinterfaces hold.
    fn collect_members(
        &self,
        iface: &Node<InterfaceDecl>,
        origin: &Node<SourceFile>,
        seen: &mut HashSet<String>,
        visited: &mut HashSet<(PathBuf, String)>,
        out: &mut Vec<(Node<Member>, Node<SourceFile>)>,
    ) {
        if !visited.insert((origin.path.clone(), iface.name.clone())) {
            return;
        }
        for member in &iface.members {
            match member.name() {
                Some(name) => {
                    if seen.insert(name.to_string()) {
                        out.push((member.clone(), origin.clone()));
                    }
                }
                None => out.push((member.clone(), origin.clone())),
            }
        }
        for parent in &iface.extends {
            if let Some(resolution) = self.resolve_name(origin, parent) {
                if let Declaration::Interface(parent_iface) = resolution.decl {
                    self.collect_members(
                        &parent_iface,
                        &resolution.origin,
                        seen,
                        visited,
                        out,
                    );
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::bytecode::{Atom, Op, StackEntry};
    use crate::checker::{Checker, Project};
    use crate::extractor::Extractor;
    use enumflags2::BitFlags;

    fn prim(p: Primitive) -> Node<TypeNode> {
        Node::new(TypeNode::Prim(p))
    }

    fn reference(name: &str) -> Node<TypeNode> {
        Node::new(TypeNode::Ref { name: name.to_string(), args: vec![] })
    }

    fn prop(name: &str, ty: Node<TypeNode>) -> ClassMember {
        ClassMember::Property {
            name: name.to_string(),
            ty: Some(ty),
            optional: false,
            mods: BitFlags::empty(),
            init: None,
            doc: None,
        }
    }

    fn sig(name: &str, ty: Node<TypeNode>, optional: bool) -> Node<Member> {
        Node::new(Member::Property { name: name.to_string(), ty: Some(ty), optional })
    }

    fn class_item(name: &str) -> Item {
        Item::Decl(Declaration::Class(Node::new(ClassDecl {
            name: name.to_string(),
            members: vec![],
            exported: true,
            doc: None,
        })))
    }

    fn import_item(module: &str, name: &str) -> (Item, Node<ImportSpecifier>) {
        let spec = Node::new(ImportSpecifier::new(name, name, module));
        let item = Item::Import(Node::new(ImportDecl {
            module: module.to_string(),
            specifiers: vec![spec.clone()],
        }));
        (item, spec)
    }

    fn reexport_named(module: &str, source: &str, alias: Option<&str>) -> Item {
        Item::Reexport(Node::new(Reexport::Named {
            module: module.to_string(),
            entries: vec![(source.to_string(), alias.map(String::from))],
        }))
    }

    #[test]
    fn interface_reference_flattens_to_object_literal() {
        // interface I { a: string; b?: number }  /  p: I
        let mut project = Project::new();
        let file = project.add(SourceFile::new(
            "app",
            vec![Item::Decl(Declaration::Interface(Node::new(InterfaceDecl {
                name: "I".to_string(),
                extends: vec![],
                members: vec![
                    sig("a", prim(Primitive::Str), false),
                    sig("b", prim(Primitive::Num), true),
                ],
                exported: false,
                doc: None,
            })))],
        ));
        let checker = Checker::new(&project);

        let pack =
            Extractor::class_member(&checker, &file, &prop("p", reference("I")))
                .unwrap();
        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::String),
                Atom::Op(Op::PropertySignature),
                Atom::Index(0),
                Atom::Op(Op::Number),
                Atom::Op(Op::PropertySignature),
                Atom::Index(1),
                Atom::Op(Op::ObjectLiteral),
                Atom::Op(Op::Property),
            ]
        );
        assert_eq!(
            pack.stack,
            vec![
                StackEntry::Str("a".to_string()),
                StackEntry::Str("b".to_string()),
            ]
        );
    }

    #[test]
    fn imported_class_array_marks_import_and_pushes_thunk() {
        // items: Model[]  with Model imported from a sibling module
        let mut project = Project::new();
        project.add(SourceFile::new("lib/model", vec![class_item("Model")]));
        let (import, spec) = import_item("./model", "Model");
        let file = project.add(SourceFile::new("lib/store", vec![import]));
        let checker = Checker::new(&project);

        let array = Node::new(TypeNode::Array(reference("Model")));
        let pack =
            Extractor::class_member(&checker, &file, &prop("items", array))
                .unwrap();

        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::Class),
                Atom::Index(0),
                Atom::Op(Op::Array),
                Atom::Op(Op::Property),
            ]
        );
        assert!(spec.synthesized.get());
        match &pack.stack[0] {
            StackEntry::LazyRef(expr) => {
                assert_eq!(**expr, Expr::Arrow {
                    params: vec![],
                    ret: None,
                    body: Some(Expr::id("Model")),
                });
            }
            other => panic!("expected lazy reference, got {:?}", other),
        }
    }

    #[test]
    fn repeated_class_references_share_one_entry() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new("app", vec![class_item("Model")]));
        let checker = Checker::new(&project);

        let pair = Node::new(TypeNode::Object(vec![
            sig("left", reference("Model"), false),
            sig("right", reference("Model"), false),
        ]));
        let pack =
            Extractor::class_member(&checker, &file, &prop("pair", pair))
                .unwrap();
        let refs = pack
            .stack
            .iter()
            .filter(|e| matches!(e, StackEntry::LazyRef(_)))
            .count();
        assert_eq!(refs, 1);
    }

    #[test]
    fn type_alias_unwraps() {
        // type U = string | number, used from another file
        let mut project = Project::new();
        project.add(SourceFile::new(
            "lib/types",
            vec![Item::Decl(Declaration::Alias(Node::new(AliasDecl {
                name: "U".to_string(),
                ty: Node::new(TypeNode::Union(vec![
                    prim(Primitive::Str),
                    prim(Primitive::Num),
                ])),
                exported: true,
                doc: None,
            })))],
        ));
        let (import, _) = import_item("./types", "U");
        let file = project.add(SourceFile::new("lib/app", vec![import]));
        let checker = Checker::new(&project);

        let pack =
            Extractor::class_member(&checker, &file, &prop("x", reference("U")))
                .unwrap();
        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::String),
                Atom::Op(Op::Number),
                Atom::Op(Op::Union),
                Atom::Op(Op::Property),
            ]
        );
    }

    #[test]
    fn renamed_reexports_resolve_across_hops() {
        // c declares Base; b re-exports it as Inner; a re-exports
        // Inner as Outer; app imports Outer from a.
        let mut project = Project::new();
        project.add(SourceFile::new("pkg/c", vec![class_item("Base")]));
        project.add(SourceFile::new(
            "pkg/b",
            vec![reexport_named("./c", "Base", Some("Inner"))],
        ));
        project.add(SourceFile::new(
            "pkg/a",
            vec![reexport_named("./b", "Inner", Some("Outer"))],
        ));
        let (import, spec) = import_item("./a", "Outer");
        let file = project.add(SourceFile::new("pkg/app", vec![import]));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("value", reference("Outer")),
        )
        .unwrap();
        assert_eq!(
            pack.ops,
            vec![Atom::Op(Op::Class), Atom::Index(0), Atom::Op(Op::Property)]
        );
        assert!(spec.synthesized.get());
    }

    #[test]
    fn star_reexports_resolve() {
        let mut project = Project::new();
        project.add(SourceFile::new("pkg/inner", vec![class_item("Thing")]));
        project.add(SourceFile::new(
            "pkg/index",
            vec![Item::Reexport(Node::new(Reexport::Star {
                module: "./inner".to_string(),
            }))],
        ));
        let (import, _) = import_item("./index", "Thing");
        let file = project.add(SourceFile::new("pkg/app", vec![import]));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("thing", reference("Thing")),
        )
        .unwrap();
        assert_eq!(
            pack.ops,
            vec![Atom::Op(Op::Class), Atom::Index(0), Atom::Op(Op::Property)]
        );
    }

    #[test]
    fn unresolved_identifiers_reflect_as_any() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new("app", vec![]));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("x", reference("Mystery")),
        )
        .unwrap();
        assert_eq!(pack.ops, vec![Atom::Op(Op::Any), Atom::Op(Op::Property)]);
    }

    #[test]
    fn enums_push_a_runtime_handle() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new(
            "app",
            vec![Item::Decl(Declaration::Enum(Node::new(EnumDecl {
                name: "Color".to_string(),
                is_const: false,
                exported: false,
                doc: None,
            })))],
        ));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("color", reference("Color")),
        )
        .unwrap();
        assert_eq!(
            pack.ops,
            vec![Atom::Op(Op::Enum), Atom::Index(0), Atom::Op(Op::Property)]
        );
        assert!(matches!(pack.stack[0], StackEntry::LazyRef(_)));
    }

    #[test]
    fn const_enums_have_no_runtime_handle() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new(
            "app",
            vec![Item::Decl(Declaration::Enum(Node::new(EnumDecl {
                name: "Flags".to_string(),
                is_const: true,
                exported: false,
                doc: None,
            })))],
        ));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("flags", reference("Flags")),
        )
        .unwrap();
        assert_eq!(
            pack.ops,
            vec![Atom::Op(Op::ConstEnum), Atom::Op(Op::Property)]
        );
        assert!(pack.stack.is_empty());
    }

    #[test]
    fn child_members_shadow_parent_members() {
        // interface Base { id: number; extra: boolean }
        // interface Child extends Base { id: string }
        let mut project = Project::new();
        let file = project.add(SourceFile::new(
            "app",
            vec![
                Item::Decl(Declaration::Interface(Node::new(InterfaceDecl {
                    name: "Base".to_string(),
                    extends: vec![],
                    members: vec![
                        sig("id", prim(Primitive::Num), false),
                        sig("extra", prim(Primitive::Bool), false),
                    ],
                    exported: false,
                    doc: None,
                }))),
                Item::Decl(Declaration::Interface(Node::new(InterfaceDecl {
                    name: "Child".to_string(),
                    extends: vec!["Base".to_string()],
                    members: vec![sig("id", prim(Primitive::Str), false)],
                    exported: false,
                    doc: None,
                }))),
            ],
        ));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("c", reference("Child")),
        )
        .unwrap();
        // Child's string id first, then only the parent member the
        // child did not redeclare.
        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::String),
                Atom::Op(Op::PropertySignature),
                Atom::Index(0),
                Atom::Op(Op::Boolean),
                Atom::Op(Op::PropertySignature),
                Atom::Index(1),
                Atom::Op(Op::ObjectLiteral),
                Atom::Op(Op::Property),
            ]
        );
        assert_eq!(
            pack.stack,
            vec![
                StackEntry::Str("id".to_string()),
                StackEntry::Str("extra".to_string()),
            ]
        );
    }

    #[test]
    fn builtins_win_over_resolution() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new("app", vec![]));
        let checker = Checker::new(&project);

        let pack = Extractor::class_member(
            &checker,
            &file,
            &prop("when", reference("Date")),
        )
        .unwrap();
        assert_eq!(pack.ops, vec![Atom::Op(Op::Date), Atom::Op(Op::Property)]);

        let map = Node::new(TypeNode::Ref {
            name: "Map".to_string(),
            args: vec![prim(Primitive::Str), prim(Primitive::Num)],
        });
        let pack =
            Extractor::class_member(&checker, &file, &prop("table", map))
                .unwrap();
        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::String),
                Atom::Op(Op::Number),
                Atom::Op(Op::Map),
                Atom::Op(Op::Property),
            ]
        );
    }

    #[test]
    fn generic_class_arguments_recurse() {
        let mut project = Project::new();
        let file = project.add(SourceFile::new("app", vec![class_item("Box")]));
        let checker = Checker::new(&project);

        let boxed = Node::new(TypeNode::Ref {
            name: "Box".to_string(),
            args: vec![prim(Primitive::Str)],
        });
        let pack =
            Extractor::class_member(&checker, &file, &prop("b", boxed)).unwrap();
        assert_eq!(
            pack.ops,
            vec![
                Atom::Op(Op::String),
                Atom::Op(Op::Class),
                Atom::Index(0),
                Atom::Op(Op::Property),
            ]
        );
    }
}
