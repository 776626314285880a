//! User functions available to the interpreting backend.

use std::collections::HashMap;
use std::sync::Arc;

use flowc_core::{Record, Value};

use crate::emit::table::DataTable;
use crate::error::EmitError;

/// Constants and tables bound to one invocation, in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    pub constants: &'a [Value],
    pub tables: &'a [Arc<DataTable>],
}

impl<'a> Arguments<'a> {
    /// The `index`-th constant, `Null` if absent.
    pub fn constant(&self, index: usize) -> &'a Value {
        static NULL: Value = Value::Null;
        self.constants.get(index).unwrap_or(&NULL)
    }

    pub fn table(&self, index: usize) -> Option<&'a DataTable> {
        self.tables.get(index).map(Arc::as_ref)
    }
}

pub type TransformFn = dyn Fn(&Record, &Arguments<'_>) -> Record + Send + Sync;
pub type ModifyFn = dyn Fn(&mut Record, &Arguments<'_>) + Send + Sync;
pub type DiscriminateFn = dyn Fn(&Record, &Arguments<'_>) -> String + Send + Sync;
pub type FoldFn = dyn Fn(&mut Record, &Record, &Arguments<'_>) + Send + Sync;
pub type MasterDiscriminateFn =
    dyn Fn(Option<&Record>, &Record, &Arguments<'_>) -> String + Send + Sync;
pub type MasterTestFn = dyn Fn(Option<&Record>, &Record, &Arguments<'_>) -> bool + Send + Sync;
/// Picks one master among the candidates, by index, or none.
pub type SelectFn = dyn Fn(&[Record], &Record, &Arguments<'_>) -> Option<usize> + Send + Sync;

/// A registered user function.
#[derive(Clone)]
pub enum UserFunction {
    Transform(Arc<TransformFn>),
    Modify(Arc<ModifyFn>),
    Discriminate(Arc<DiscriminateFn>),
    Fold(Arc<FoldFn>),
    MasterDiscriminate(Arc<MasterDiscriminateFn>),
    MasterTest(Arc<MasterTestFn>),
    Select(Arc<SelectFn>),
}

impl UserFunction {
    pub fn label(&self) -> &'static str {
        match self {
            UserFunction::Transform(_) => "transform",
            UserFunction::Modify(_) => "modify",
            UserFunction::Discriminate(_) => "discriminate",
            UserFunction::Fold(_) => "fold",
            UserFunction::MasterDiscriminate(_) => "master discriminate",
            UserFunction::MasterTest(_) => "master test",
            UserFunction::Select(_) => "select",
        }
    }
}

/// User functions by name.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, UserFunction>,
}

macro_rules! accessor {
    ($get:ident, $variant:ident, $ty:ty, $label:literal) => {
        pub fn $get(&self, name: &str) -> Result<Arc<$ty>, EmitError> {
            match self.lookup(name)? {
                UserFunction::$variant(f) => Ok(Arc::clone(f)),
                _ => Err(EmitError::FunctionKind {
                    name: name.to_string(),
                    expected: $label,
                }),
            }
        }
    };
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, function: UserFunction) {
        self.functions.insert(name.into(), function);
    }

    pub fn transform(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Record, &Arguments<'_>) -> Record + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::Transform(Arc::new(f)));
        self
    }

    pub fn modify(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Record, &Arguments<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::Modify(Arc::new(f)));
        self
    }

    pub fn discriminate(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Record, &Arguments<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::Discriminate(Arc::new(f)));
        self
    }

    pub fn fold(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Record, &Record, &Arguments<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::Fold(Arc::new(f)));
        self
    }

    pub fn master_discriminate(
        mut self,
        name: impl Into<String>,
        f: impl Fn(Option<&Record>, &Record, &Arguments<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::MasterDiscriminate(Arc::new(f)));
        self
    }

    pub fn master_test(
        mut self,
        name: impl Into<String>,
        f: impl Fn(Option<&Record>, &Record, &Arguments<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::MasterTest(Arc::new(f)));
        self
    }

    pub fn select(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[Record], &Record, &Arguments<'_>) -> Option<usize> + Send + Sync + 'static,
    ) -> Self {
        self.register(name, UserFunction::Select(Arc::new(f)));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<&UserFunction, EmitError> {
        self.functions
            .get(name)
            .ok_or_else(|| EmitError::UnknownFunction(name.to_string()))
    }

    accessor!(get_transform, Transform, TransformFn, "transform");
    accessor!(get_modify, Modify, ModifyFn, "modify");
    accessor!(get_discriminate, Discriminate, DiscriminateFn, "discriminate");
    accessor!(get_fold, Fold, FoldFn, "fold");
    accessor!(
        get_master_discriminate,
        MasterDiscriminate,
        MasterDiscriminateFn,
        "master discriminate"
    );
    accessor!(get_master_test, MasterTest, MasterTestFn, "master test");
    accessor!(get_select, Select, SelectFn, "select");
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .functions
            .iter()
            .map(|(name, function)| (name.as_str(), function.label()))
            .collect();
        names.sort();
        f.debug_map().entries(names).finish()
    }
}
