use std::cell::RefCell;
use std::rc::Rc;

/// A live, in-memory configuration-language value: the shape the loader's
/// interpreter produces and the analysis computations consume. `List` and
/// `Dict` are reference-counted and interior-mutable because the
/// configuration language allows a container to alias, and even contain,
/// itself (e.g. a struct field capturing the enclosing scope); [`encode`]
/// detects such cycles by walking with a path set keyed on these pointers.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Struct(Rc<Vec<(String, Value)>>),
    Label(Rc<str>),
    /// A function, rule, or provider instance. These cannot be
    /// losslessly serialized without the originating compiled program,
    /// so encoding them always sets `needs_code`.
    Function { name: Rc<str> },
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(items: Vec<(Value, Value)>) -> Self {
        Value::Dict(Rc::new(RefCell::new(items)))
    }

    pub fn strukt(fields: Vec<(String, Value)>) -> Self {
        Value::Struct(Rc::new(fields))
    }

    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn label(s: impl Into<Rc<str>>) -> Self {
        Value::Label(s.into())
    }

    /// A stable identity for cycle detection; only containers capable of
    /// aliasing carry one.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::List(rc) => Some(Rc::as_ptr(rc) as usize),
            Value::Dict(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }
}

/// The wire shape of a [`Value`]: structurally identical, except every
/// container child is an [`EncodedChild`] that may point out-of-line.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EncodedValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<EncodedChild>),
    Dict(Vec<(EncodedChild, EncodedChild)>),
    Struct(Vec<(String, EncodedChild)>),
    Label(String),
    /// A function/rule/provider instance could not be encoded without its
    /// compiled program; `needs_code` on the enclosing [`crate::EncodeResult`]
    /// is set whenever this variant appears anywhere in the tree.
    NeedsCode { name: String },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EncodedChild {
    Inline(Box<EncodedValue>),
    OutOfLine(u32),
}
