use crate::runtime::error::ErrorKind;
use crate::runtime::types::TypeDesc;
use crate::runtime::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// One scope frame: name-to-cell bindings plus a type registry, linked
/// to its parent. Clones share the frame, so a scope can be captured by
/// closures and module values.
#[derive(Clone)]
pub struct Env {
    inner: Arc<Mutex<EnvInner>>,
}

struct EnvInner {
    values: HashMap<String, Arc<Mutex<Value>>>,
    types: HashMap<String, TypeDesc>,
    parent: Option<Env>,
}

impl Env {
    pub fn root() -> Self {
        let env = Self::empty(None);
        env.define_type("bool", TypeDesc::Bool);
        env.define_type("int", TypeDesc::Int);
        env.define_type("float", TypeDesc::Float);
        env.define_type("string", TypeDesc::Str);
        env
    }

    pub fn child(&self) -> Self {
        Self::empty(Some(self.clone()))
    }

    fn empty(parent: Option<Env>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EnvInner {
                values: HashMap::new(),
                types: HashMap::new(),
                parent,
            })),
        }
    }

    pub fn define(&self, name: &str, value: Value) {
        self.inner
            .lock()
            .unwrap()
            .values
            .insert(name.to_string(), Arc::new(Mutex::new(value)));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_cell(name)
            .map(|cell| cell.lock().unwrap().clone())
    }

    // named variables are addressable through their binding cell
    pub fn get_cell(&self, name: &str) -> Option<Arc<Mutex<Value>>> {
        let mut current = self.clone();
        loop {
            let parent = {
                let inner = current.inner.lock().unwrap();
                if let Some(cell) = inner.values.get(name) {
                    return Some(Arc::clone(cell));
                }
                inner.parent.clone()
            };
            match parent {
                Some(next) => current = next,
                None => return None,
            }
        }
    }

    /// Writes to the nearest frame that already defines `name`, falling
    /// back to defining it in this frame.
    pub fn set_value(&self, name: &str, value: Value) {
        match self.get_cell(name) {
            Some(cell) => *cell.lock().unwrap() = value,
            None => self.define(name, value),
        }
    }

    pub fn define_type(&self, name: &str, desc: TypeDesc) {
        self.inner
            .lock()
            .unwrap()
            .types
            .insert(name.to_string(), desc);
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeDesc> {
        let mut current = self.clone();
        loop {
            let parent = {
                let inner = current.inner.lock().unwrap();
                if let Some(desc) = inner.types.get(name) {
                    return Some(desc.clone());
                }
                inner.parent.clone()
            };
            match parent {
                Some(next) => current = next,
                None => return None,
            }
        }
    }

    /// Walks a dotted path through module bindings, returning the owning
    /// scope and the leaf name.
    pub fn resolve_dotted(&self, path: &str) -> Result<(Env, String), ErrorKind> {
        let mut segments = path.split('.').collect::<Vec<_>>();
        let leaf = segments.pop().unwrap_or_default().to_string();
        let mut scope = self.clone();
        for segment in segments {
            let value = scope.get(segment).ok_or_else(|| ErrorKind::UndefinedSymbol {
                name: segment.to_string(),
            })?;
            match value {
                Value::Module(inner) => scope = inner,
                _ => {
                    return Err(ErrorKind::InvalidMember {
                        name: segment.to_string(),
                    })
                }
            }
        }
        Ok((scope, leaf))
    }

    pub fn same(&self, other: &Env) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<env>")
    }
}
