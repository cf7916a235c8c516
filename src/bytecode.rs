// The type instruction set and its wire codec.
//
// A reflected declaration compiles to a flat sequence of opcodes plus a
// small heterogeneous literal stack. The reader reconstructs the type
// with an implicit stack machine: most opcodes produce a type, a few
// consume the current frame and produce an aggregate, and Frame opens a
// scope boundary so n-ary aggregates need no embedded arity.
//
// On the wire, every opcode (and every inline parameter that follows
// one) occupies a single 6-bit slot. Ten slots pack into one 60-bit
// chunk, each chunk renders as base-36 text, and all chunks but the
// last are padded to twelve characters so the decoder can peel
// contiguous twelve-character groups. The slot stream ends at a zero
// slot in opcode position: the sentinel End.
//
// The literal stack rides alongside the encoded text. An empty stack
// packs to a bare string; otherwise the packed form is the stack in
// order with the encoded string as the final element.

use crate::ast::{Expr, Node};


// Bits per slot. An opcode or parameter index must fit in this width.
pub const PACK_SIZE_BITS: usize = 6;
const SLOT_MASK: u64 = (1 << PACK_SIZE_BITS) - 1;

// Slots per chunk: 10 * 6 = 60 bits, below both u64 and 36^12.
pub const SLOTS_PER_CHUNK: usize = 10;

// Characters per rendered chunk. 36^11 < 2^60 < 36^12.
pub const CHUNK_CHARS: usize = 12;

// Hard bound on literal-stack growth: indices are single slots.
pub const MAX_STACK: usize = 1 << PACK_SIZE_BITS;


// Each opcode declares how many inline parameter slots follow it.
macro_rules! opcodes {
    ( $( $name:ident = $code:literal / $params:literal ),* $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Op {
            $( $name = $code ),*
        }

        impl Op {
            pub fn params(self) -> usize {
                match self {
                    $( Op::$name => $params ),*
                }
            }

            pub fn from_slot(slot: u64) -> Option<Op> {
                match slot {
                    $( $code => Some(Op::$name) ),* ,
                    _ => None
                }
            }
        }
    };
}

opcodes! {
    End              = 0 / 0,

    // Primitives.
    String           = 1 / 0,
    Number           = 2 / 0,
    Boolean          = 3 / 0,
    BigInt           = 4 / 0,
    Void             = 5 / 0,
    Null             = 6 / 0,
    Undefined        = 7 / 0,
    Any              = 8 / 0,

    // Built-in nominal references.
    Date             = 9 / 0,
    ArrayBuffer      = 10 / 0,
    Int8Array        = 11 / 0,
    Uint8Array       = 12 / 0,
    Uint8ClampedArray = 13 / 0,
    Int16Array       = 14 / 0,
    Uint16Array      = 15 / 0,
    Int32Array       = 16 / 0,
    Uint32Array      = 17 / 0,
    Float32Array     = 18 / 0,
    Float64Array     = 19 / 0,
    BigInt64Array    = 20 / 0,
    BigUint64Array   = 21 / 0,
    Promise          = 22 / 0,

    Literal          = 23 / 1,

    // Structural aggregates.
    ObjectLiteral    = 24 / 0,
    Class            = 25 / 1,
    ConstEnum        = 26 / 0,

    // Collection constructors.
    Array            = 27 / 0,
    Set              = 28 / 0,
    Map              = 29 / 0,
    IndexSignature   = 30 / 0,
    Enum             = 31 / 1,

    // Members.
    Property         = 32 / 0,
    PropertySignature = 33 / 1,
    Method           = 34 / 0,
    MethodSignature  = 35 / 1,
    Constructor      = 36 / 0,
    Function         = 37 / 0,

    // Modifiers, decorating the top member.
    Optional         = 38 / 0,
    Private          = 39 / 0,
    Protected        = 40 / 0,
    Abstract         = 41 / 0,

    // Type algebra.
    Union            = 42 / 0,
    Intersection     = 43 / 0,
    Frame            = 44 / 0,
    Push             = 45 / 1,
    Query            = 46 / 0,
    Condition        = 47 / 0,
    Extends          = 48 / 0,
}


// One 6-bit slot of the instruction stream: an opcode, or the inline
// parameter slot that an opcode declared.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Atom {
    Op(Op),
    Index(usize),
}

impl Atom {
    fn slot(&self) -> u64 {
        match self {
            Atom::Op(op) => *op as u64,
            Atom::Index(i) => *i as u64 & SLOT_MASK,
        }
    }
}


// Literal-stack entries. Lazy references compare by node identity:
// two closures over the same synthesized arrow are one entry.
#[derive(Clone, Debug)]
pub enum StackEntry {
    Str(String),
    Num(f64),
    Bool(bool),
    LazyRef(Node<Expr>),
}

impl PartialEq for StackEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StackEntry::Str(a), StackEntry::Str(b)) => a == b,
            (StackEntry::Num(a), StackEntry::Num(b)) => a == b,
            (StackEntry::Bool(a), StackEntry::Bool(b)) => a == b,
            (StackEntry::LazyRef(a), StackEntry::LazyRef(b)) => Node::ptr_eq(a, b),
            _ => false,
        }
    }
}


// The wire form. The stack, when present, precedes the encoded text.
#[derive(Clone, Debug, PartialEq)]
pub enum Packed {
    Encoded(String),
    WithStack(Vec<StackEntry>, String),
}

impl Packed {
    pub fn encoded(&self) -> &str {
        match self {
            Packed::Encoded(text) => text,
            Packed::WithStack(_, text) => text,
        }
    }

    pub fn stack(&self) -> &[StackEntry] {
        match self {
            Packed::Encoded(_) => &[],
            Packed::WithStack(stack, _) => stack,
        }
    }
}


// The (opcodes, literal stack) pair for one reflected declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct PackStruct {
    pub ops: Vec<Atom>,
    pub stack: Vec<StackEntry>,
}

impl PackStruct {
    pub fn new() -> PackStruct {
        PackStruct { ops: vec![], stack: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn emit(&mut self, op: Op) {
        self.ops.push(Atom::Op(op));
    }

    pub fn emit_with(&mut self, op: Op, index: usize) {
        self.ops.push(Atom::Op(op));
        self.ops.push(Atom::Index(index));
    }

    // Place an entry on the literal stack, reusing the index of an
    // equal entry. The stack is small in practice; a linear scan keeps
    // indices stable. None once indices no longer fit a slot.
    pub fn intern(&mut self, entry: StackEntry) -> Option<usize> {
        if let Some(i) = self.stack.iter().position(|e| *e == entry) {
            return Some(i);
        }
        if self.stack.len() >= MAX_STACK {
            return None;
        }
        self.stack.push(entry);
        Some(self.stack.len() - 1)
    }

    pub fn pack(&self) -> Packed {
        pack(&self.ops, &self.stack)
    }
}


const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn radix36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = vec![];
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}


// Encode an instruction stream and its literal stack into wire form.
// The End sentinel is appended here; callers never emit it.
pub fn pack(ops: &[Atom], stack: &[StackEntry]) -> Packed {
    let mut slots: Vec<u64> = ops.iter().map(Atom::slot).collect();
    slots.push(Op::End as u64);

    let mut chunks: Vec<u64> = vec![];
    for group in slots.chunks(SLOTS_PER_CHUNK) {
        let mut value = 0u64;
        for (i, slot) in group.iter().enumerate() {
            value |= (slot & SLOT_MASK) << (PACK_SIZE_BITS * i);
        }
        chunks.push(value);
    }

    let last = chunks.len() - 1;
    let mut encoded = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let digits = radix36(*chunk);
        if i < last {
            for _ in digits.len()..CHUNK_CHARS {
                encoded.push('0');
            }
        }
        encoded.push_str(&digits);
    }

    if stack.is_empty() {
        Packed::Encoded(encoded)
    } else {
        Packed::WithStack(stack.to_vec(), encoded)
    }
}


// Decode the wire form back to (opcodes, literal stack). Parameter
// slots are consumed unconditionally per the opcode's declared count,
// so a zero parameter index never terminates the stream; a zero slot
// in opcode position does. High-order zero slots of the final chunk
// decode as the sentinel, as does a slot holding no known opcode.
pub fn unpack(packed: &Packed) -> PackStruct {
    let (stack, text) = match packed {
        Packed::Encoded(text) => (vec![], text.as_str()),
        Packed::WithStack(stack, text) => (stack.clone(), text.as_str()),
    };

    let mut chunks: Vec<u64> = vec![];
    let mut at = 0;
    while at < text.len() {
        let end = (at + CHUNK_CHARS).min(text.len());
        chunks.push(u64::from_str_radix(&text[at..end], 36).unwrap_or(0));
        at = end;
    }

    let slot = |i: usize| -> u64 {
        match chunks.get(i / SLOTS_PER_CHUNK) {
            Some(chunk) => {
                (chunk >> (PACK_SIZE_BITS * (i % SLOTS_PER_CHUNK))) & SLOT_MASK
            }
            None => 0,
        }
    };

    let capacity = chunks.len() * SLOTS_PER_CHUNK;
    let mut ops = vec![];
    let mut pos = 0;
    while pos < capacity {
        let value = slot(pos);
        pos += 1;
        let op = match Op::from_slot(value) {
            Some(Op::End) | None => break,
            Some(op) => op,
        };
        ops.push(Atom::Op(op));
        for _ in 0..op.params() {
            ops.push(Atom::Index(slot(pos) as usize));
            pos += 1;
        }
    }

    PackStruct { ops, stack }
}
