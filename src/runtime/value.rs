use crate::language::ast::Expr;
use crate::runtime::environment::Env;
use crate::runtime::error::{ErrorKind, RuntimeResult};
use crate::runtime::types::TypeDesc;
use crossbeam::channel::{bounded, Receiver, RecvError, SendError, Sender};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A runtime value. Sequences, maps, channels, and pointers are
/// reference-shared handles; everything else is copied on assignment.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(SeqValue),
    Map(MapValue),
    Struct(StructValue),
    Ptr(PtrValue),
    Chan(ChanValue),
    Func(FuncValue),
    Type(TypeDesc),
    Module(Env),
    Hosted(HostValue),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Ptr(_) => "ptr",
            Value::Chan(_) => "chan",
            Value::Func(_) => "func",
            Value::Type(_) => "type",
            Value::Module(_) => "module",
            Value::Hosted(h) => h.0.kind(),
        }
    }

    /// Structural equality. Mixed-kind comparisons, including int
    /// against float, are unequal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => {
                if a.shares_backing(b) {
                    return true;
                }
                let (av, bv) = (a.snapshot(), b.snapshot());
                av.len() == bv.len() && av.iter().zip(bv.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.shares(b) {
                    return true;
                }
                let (av, bv) = (a.snapshot(), b.snapshot());
                av.len() == bv.len()
                    && av.iter().zip(bv.iter()).all(|((ka, va), (kb, vb))| {
                        ka == kb && va.equals(vb)
                    })
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.name == b.name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(b.fields.iter()).all(|((na, va), (nb, vb))| {
                        na == nb && va.equals(vb)
                    })
            }
            (Value::Ptr(a), Value::Ptr(b)) => a.shares(b) || a.get().equals(&b.get()),
            (Value::Chan(a), Value::Chan(b)) => a.shares(b),
            (Value::Func(a), Value::Func(b)) => a.same(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a.same(b),
            (Value::Hosted(a), Value::Hosted(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Seq(seq) => {
                write!(f, "[")?;
                for (idx, value) in seq.snapshot().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                let mut first = true;
                for (key, value) in map.snapshot() {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(instance) => write!(f, "{instance}"),
            Value::Ptr(ptr) => write!(f, "&{}", ptr.get()),
            Value::Chan(chan) => write!(f, "<chan {}>", chan.elem()),
            Value::Func(func) => write!(f, "<func {}>", func.display_name()),
            Value::Type(desc) => write!(f, "<type {desc}>"),
            Value::Module(_) => write!(f, "<module>"),
            Value::Hosted(h) => write!(f, "<{}>", h.0.kind()),
        }
    }
}

/// Clones share the backing store; a slice view selects a window of
/// it, so mutation through the view is visible through every alias.
#[derive(Clone, Debug)]
pub struct SeqValue {
    items: Arc<Mutex<Vec<Value>>>,
    start: usize,
    len: usize,
    elem: Option<TypeDesc>,
}

impl SeqValue {
    pub fn new(elem: Option<TypeDesc>) -> Self {
        Self::from_vec(Vec::new(), elem)
    }

    pub fn from_vec(items: Vec<Value>, elem: Option<TypeDesc>) -> Self {
        let len = items.len();
        Self {
            items: Arc::new(Mutex::new(items)),
            start: 0,
            len,
            elem,
        }
    }

    pub fn with_capacity(items: Vec<Value>, capacity: usize, elem: Option<TypeDesc>) -> Self {
        let len = items.len();
        let mut backing = Vec::with_capacity(capacity.max(len));
        backing.extend(items);
        Self {
            items: Arc::new(Mutex::new(backing)),
            start: 0,
            len,
            elem,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn elem(&self) -> Option<&TypeDesc> {
        self.elem.as_ref()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        self.items.lock().unwrap().get(self.start + index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        if index >= self.len {
            return false;
        }
        match self.items.lock().unwrap().get_mut(self.start + index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    // callers have already validated begin <= end <= len
    pub fn view(&self, begin: usize, end: usize) -> SeqValue {
        SeqValue {
            items: Arc::clone(&self.items),
            start: self.start + begin,
            len: end - begin,
            elem: self.elem.clone(),
        }
    }

    pub fn snapshot(&self) -> Vec<Value> {
        let items = self.items.lock().unwrap();
        let end = (self.start + self.len).min(items.len());
        items[self.start.min(end)..end].to_vec()
    }

    pub fn shares_backing(&self, other: &SeqValue) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
            && self.start == other.start
            && self.len == other.len
    }
}

/// Only scalar kinds are usable as keys; float keys compare by bit
/// pattern.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Nil,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl MapKey {
    pub fn str(name: impl Into<String>) -> MapKey {
        MapKey::Str(name.into())
    }

    pub fn from_value(value: &Value) -> Result<MapKey, ErrorKind> {
        match value {
            Value::Nil => Ok(MapKey::Nil),
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Float(f) => Ok(MapKey::Float(f.to_bits())),
            Value::Str(s) => Ok(MapKey::Str(s.clone())),
            other => Err(ErrorKind::InvalidMapKey {
                kind: other.kind_name(),
            }),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Nil => write!(f, "nil"),
            MapKey::Bool(v) => write!(f, "{v}"),
            MapKey::Int(v) => write!(f, "{v}"),
            MapKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            MapKey::Str(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MapValue {
    entries: Arc<Mutex<BTreeMap<MapKey, Value>>>,
}

impl MapValue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn from_entries(entries: Vec<(MapKey, Value)>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries.into_iter().collect())),
        }
    }

    pub fn insert(&self, key: MapKey, value: Value) {
        self.entries.lock().unwrap().insert(key, value);
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(MapKey, Value)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn shares(&self, other: &MapValue) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl Default for MapValue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning copies the record, so structs have value semantics unless
/// explicitly boxed by address-of.
#[derive(Clone, Debug)]
pub struct StructValue {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl StructValue {
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn get_field(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    // record shape is fixed after construction; unknown fields are rejected
    pub fn set_field(&mut self, field: &str, value: Value) -> bool {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        let mut first = true;
        for (name, value) in &self.fields {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// An address: a shared cell holding one value. Named variables hand
/// out their binding cell; everything else gets a freshly boxed copy.
#[derive(Clone, Debug)]
pub struct PtrValue {
    cell: Arc<Mutex<Value>>,
}

impl PtrValue {
    pub fn new(value: Value) -> Self {
        Self {
            cell: Arc::new(Mutex::new(value)),
        }
    }

    pub fn from_cell(cell: Arc<Mutex<Value>>) -> Self {
        Self { cell }
    }

    pub fn get(&self) -> Value {
        self.cell.lock().unwrap().clone()
    }

    pub fn set(&self, value: Value) {
        *self.cell.lock().unwrap() = value;
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.cell.lock().unwrap())
    }

    pub fn shares(&self, other: &PtrValue) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

/// Clones share the queue. Capacity 0 is a rendezvous: send blocks
/// until a receiver arrives and vice versa.
#[derive(Clone, Debug)]
pub struct ChanValue {
    sender: Sender<Value>,
    receiver: Receiver<Value>,
    capacity: usize,
    elem: TypeDesc,
}

impl ChanValue {
    /// Panics on a negative size; callers route construction through
    /// the fault boundary.
    pub fn new(size: i64, elem: TypeDesc) -> Self {
        let capacity = usize::try_from(size).expect("negative channel capacity");
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            elem,
        }
    }

    pub fn send(&self, value: Value) -> Result<(), SendError<Value>> {
        self.sender.send(value)
    }

    pub fn recv(&self) -> Result<Value, RecvError> {
        self.receiver.recv()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn elem(&self) -> &TypeDesc {
        &self.elem
    }

    pub fn shares(&self, other: &ChanValue) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

pub type NativeFn = Arc<dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// A script function closing over its defining scope, or a native host
/// function; either may carry a bound receiver.
#[derive(Clone)]
pub struct FuncValue {
    pub name: Option<String>,
    pub recv: Option<Box<Value>>,
    pub kind: FuncKind,
}

#[derive(Clone)]
pub enum FuncKind {
    Script {
        params: Vec<String>,
        body: Arc<Expr>,
        env: Env,
    },
    Native(NativeFn),
}

impl FuncValue {
    pub fn script(name: Option<String>, params: Vec<String>, body: Arc<Expr>, env: Env) -> Self {
        Self {
            name,
            recv: None,
            kind: FuncKind::Script { params, body, env },
        }
    }

    pub fn native(name: impl Into<String>, f: NativeFn) -> Self {
        Self {
            name: Some(name.into()),
            recv: None,
            kind: FuncKind::Native(f),
        }
    }

    pub fn bound(name: impl Into<String>, f: NativeFn, recv: Value) -> Self {
        Self {
            name: Some(name.into()),
            recv: Some(Box::new(recv)),
            kind: FuncKind::Native(f),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    pub fn same(&self, other: &FuncValue) -> bool {
        match (&self.kind, &other.kind) {
            (FuncKind::Script { body: a, .. }, FuncKind::Script { body: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (FuncKind::Native(a), FuncKind::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<func {}>", self.display_name())
    }
}

/// Capability dispatch for host data, implemented per concrete host
/// type. Member resolution asks for a method before a field.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static str;

    fn field(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Methods receive the bound receiver as their first argument.
    fn method(&self, name: &str) -> Option<NativeFn> {
        let _ = name;
        None
    }

    fn as_seq(&self) -> Option<SeqValue> {
        None
    }

    fn as_map(&self) -> Option<MapValue> {
        None
    }
}

#[derive(Clone, Debug)]
pub struct HostValue(pub Arc<dyn HostObject>);

impl HostValue {
    pub fn new(obj: impl HostObject + 'static) -> Self {
        Self(Arc::new(obj))
    }
}
