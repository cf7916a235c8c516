// Installs packed type data into the emitted program: a static member
// on classes, a post-assignment on named functions, and an
// Object.assign wrap around anonymous callables.

use crate::ast::{AList, ClassDecl, ClassMember, Expr, Modifier, Node, Seq};
use crate::bytecode::{Packed, StackEntry};
use enumflags2::BitFlags;


// The property the runtime library reads.
pub const TYPE_PROPERTY: &str = "__type";


// Render the wire form as an expression: a string literal, or an array
// literal whose last element is the encoded string. Lazy references
// are inserted as their synthesized closures, verbatim.
pub fn packed_expr(packed: &Packed) -> Node<Expr> {
    match packed {
        Packed::Encoded(text) => Expr::str(text),
        Packed::WithStack(stack, text) => {
            let mut items: Seq<Expr> = stack.iter().map(entry_expr).collect();
            items.push(Expr::str(text));
            Expr::array(items)
        }
    }
}

fn entry_expr(entry: &StackEntry) -> Node<Expr> {
    match entry {
        StackEntry::Str(value) => Expr::str(value),
        StackEntry::Num(value) => Node::new(Expr::Num(*value)),
        StackEntry::Bool(value) => Node::new(Expr::Bool(*value)),
        StackEntry::LazyRef(expr) => expr.clone(),
    }
}


pub fn has_type_member(class: &ClassDecl) -> bool {
    class
        .members
        .iter()
        .any(|m| m.is_static() && m.name() == TYPE_PROPERTY)
}

// Aggregate per-member packs under one static object. A class that
// produced nothing, or that already carries the member, is returned
// unchanged.
pub fn decorate_class(
    class: &Node<ClassDecl>,
    packs: &[(String, Packed)],
) -> Node<ClassDecl> {
    if packs.is_empty() || has_type_member(class) {
        return class.clone();
    }
    let fields: AList<Expr> = packs
        .iter()
        .map(|(name, packed)| (name.clone(), packed_expr(packed)))
        .collect();

    let mut members = class.members.clone();
    members.push(ClassMember::Property {
        name: TYPE_PROPERTY.to_string(),
        ty: None,
        optional: false,
        mods: BitFlags::from_flag(Modifier::Static),
        init: Some(Expr::object(fields)),
        doc: None,
    });
    Node::new(ClassDecl { members, ..(**class).clone() })
}

// name.__type = <packed>
pub fn function_pack_statement(name: &str, packed: &Packed) -> Node<Expr> {
    Expr::assign(
        Expr::dot(&Expr::id(name), TYPE_PROPERTY),
        packed_expr(packed),
    )
}

// Object.assign(expr, { __type: <packed> }) — anonymous callables have
// no name binding to assign through, and the wrap preserves the value.
pub fn wrap_expression(expr: &Node<Expr>, packed: &Packed) -> Node<Expr> {
    Expr::call(
        Expr::dot(&Expr::id("Object"), "assign"),
        vec![
            expr.clone(),
            Expr::object(vec![(TYPE_PROPERTY.to_string(), packed_expr(packed))]),
        ],
    )
}
