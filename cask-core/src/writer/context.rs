use crate::{ColumnType, Value};
use std::ops::{Deref, DerefMut};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    CqlDelete,
    CqlInsertInto,
    CqlInsertIntoValues,
    CqlSelect,
    CqlUpdate,
    CqlUpdateSet,
    CqlUsing,
    /// Equality on the requested primary key.
    CqlWhereKey,
    CqlWhere,
    CqlCondition,
}

/// How the type of a bind marker derives from the type of its column.
#[derive(Debug, Clone, PartialEq)]
pub enum BindShape {
    Column,
    /// `IN ?`
    ListOf,
    /// `CONTAINS ?`
    ElementOf,
    /// `CONTAINS KEY ?`
    KeyOf,
    /// Keys removed from a map.
    KeySetOf,
    Fixed(ColumnType),
}

/// Value bound to a `?` marker, in marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub column: String,
    pub shape: BindShape,
    pub value: Value,
    /// Part of the requested primary key.
    pub key: bool,
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Context {
    pub fragment: Fragment,
    pub binds: Vec<Bind>,
}

impl Context {
    pub fn new(fragment: Fragment) -> Self {
        Self {
            fragment,
            binds: Vec::new(),
        }
    }
    pub fn switch_fragment<'s>(&'s mut self, fragment: Fragment) -> ContextUpdater<'s> {
        let previous = self.fragment;
        self.fragment = fragment;
        ContextUpdater {
            current: self,
            previous,
        }
    }
}

/// Restores the previous fragment when dropped.
pub struct ContextUpdater<'a> {
    current: &'a mut Context,
    previous: Fragment,
}

impl<'a> Deref for ContextUpdater<'a> {
    type Target = Context;
    fn deref(&self) -> &Self::Target {
        self.current
    }
}

impl<'a> DerefMut for ContextUpdater<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.current
    }
}

impl<'a> Drop for ContextUpdater<'a> {
    fn drop(&mut self) {
        self.current.fragment = self.previous;
    }
}
