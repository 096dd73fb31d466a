use std::ops::{Deref, Index, IndexMut};

/// Vec that can only be indexed by the specified `Idx` type.
/// New items are appended with [`IndexVec::push`], which hands out the index of the item,
/// so ids created by `define_id_type` never dangle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexVec<Idx, Value>(Vec<Value>, std::marker::PhantomData<Idx>);

impl<Idx, Value> Default for IndexVec<Idx, Value> {
    fn default() -> Self {
        Self(Vec::new(), Default::default())
    }
}

impl<Idx: Into<usize> + From<usize> + Copy, Value> IndexVec<Idx, Value> {
    #[inline]
    pub fn push(&mut self, value: Value) -> Idx {
        let idx = Idx::from(self.0.len());
        self.0.push(value);
        idx
    }

    #[inline]
    pub fn get(&self, index: Idx) -> Option<&Value> {
        self.0.get(index.into())
    }

    #[inline]
    pub fn get_mut(&mut self, index: Idx) -> Option<&mut Value> {
        self.0.get_mut(index.into())
    }

    /// Iterates over `(index, value)` pairs in index order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (Idx, &Value)> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, value)| (Idx::from(i), value))
    }
}

impl<Idx: Into<usize>, Value> Index<Idx> for IndexVec<Idx, Value> {
    type Output = Value;

    #[inline]
    fn index(&self, index: Idx) -> &Self::Output {
        self.0.index(index.into())
    }
}

impl<Idx: Into<usize>, Value> IndexMut<Idx> for IndexVec<Idx, Value> {
    #[inline]
    fn index_mut(&mut self, index: Idx) -> &mut Self::Output {
        self.0.index_mut(index.into())
    }
}

// Only shared access is exposed; items are never removed so that ids stay valid.
impl<Idx, Value> Deref for IndexVec<Idx, Value> {
    type Target = [Value];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Create a newtype that will contain an index represented by an integer.
#[macro_export]
macro_rules! define_id_type {
    ($name: ident, $type: ident) => {
        #[derive(
            ::std::marker::Copy,
            ::std::clone::Clone,
            ::std::default::Default,
            ::std::fmt::Debug,
            ::std::hash::Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::Ord,
            ::std::cmp::PartialOrd,
            ::std::cmp::Eq,
            ::std::cmp::PartialEq,
        )]
        pub struct $name($type);

        impl $name {
            #[inline]
            pub fn new(value: $type) -> Self {
                Self(value)
            }

            #[inline]
            pub fn as_num(&self) -> $type {
                self.0 as $type
            }
        }

        impl ::std::convert::From<$type> for $name {
            #[inline]
            fn from(value: $type) -> Self {
                Self::new(value)
            }
        }

        impl ::std::convert::From<$name> for usize {
            #[inline]
            fn from(id: $name) -> Self {
                id.0 as usize
            }
        }

        impl ::std::convert::From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index as $type)
            }
        }

        impl ::std::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::std::num::ParseIntError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                Ok($name(s.parse::<$type>()?))
            }
        }
    };
}
