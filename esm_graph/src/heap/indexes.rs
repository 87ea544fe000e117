// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt::Debug;
use std::{
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::size_of,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

use crate::ecmascript::{
    builtins::{
        error::ErrorHeapData, module::ModuleNamespaceHeapData, promise::PromiseHeapData,
    },
    execution::environments::ModuleEnvironmentRecord,
    scripts_and_modules::module::module_semantics::{
        cyclic_module_records::GraphLoadingStateRecord,
        source_text_module_records::SourceTextModuleRecord,
        synthetic_module_records::SyntheticModuleRecord,
    },
    types::StringHeapData,
};

/// A struct containing a non-zero index into a vector of `T`s. Due to the
/// non-zero value, the offset in the vector is offset by one.
pub struct BaseIndex<T: ?Sized>(NonZeroU32, PhantomData<T>);

const _INDEX_SIZE_IS_U32: () = assert!(size_of::<BaseIndex<()>>() == size_of::<u32>());
const _OPTION_INDEX_SIZE_IS_U32: () =
    assert!(size_of::<Option<BaseIndex<()>>>() == size_of::<u32>());

impl<T: ?Sized> Debug for BaseIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.into_u32_index().fmt(f)
    }
}

impl<T: ?Sized> Clone for BaseIndex<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for BaseIndex<T> {}

impl<T: ?Sized> PartialEq for BaseIndex<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: ?Sized> Eq for BaseIndex<T> {}

impl<T: ?Sized> PartialOrd for BaseIndex<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for BaseIndex<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T: ?Sized> Hash for BaseIndex<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: ?Sized> BaseIndex<T> {
    pub const fn into_index(self) -> usize {
        self.0.get() as usize - 1
    }

    pub const fn into_u32_index(self) -> u32 {
        self.0.get() - 1
    }

    pub const fn from_index(value: usize) -> Self {
        assert!(value < u32::MAX as usize);
        let value = value as u32;
        // SAFETY: Number is not max value and will not overflow to zero.
        // This check is done manually to allow const context.
        Self(unsafe { NonZeroU32::new_unchecked(value + 1) }, PhantomData)
    }

    pub const fn from_u32_index(value: u32) -> Self {
        assert!(value != u32::MAX);
        // SAFETY: Number is not max value and will not overflow to zero.
        // This check is done manually to allow const context.
        Self(unsafe { NonZeroU32::new_unchecked(value + 1) }, PhantomData)
    }

    /// Index of the last element of `vec`.
    pub fn last(vec: &[T]) -> Self
    where
        T: Sized,
    {
        assert!(!vec.is_empty());
        Self::from_index(vec.len() - 1)
    }
}

impl<T> Index<BaseIndex<T>> for Vec<T> {
    type Output = T;

    fn index(&self, index: BaseIndex<T>) -> &Self::Output {
        self.get(index.into_index())
            .expect("Invalid heap index: No item at index")
    }
}

impl<T> IndexMut<BaseIndex<T>> for Vec<T> {
    fn index_mut(&mut self, index: BaseIndex<T>) -> &mut Self::Output {
        self.get_mut(index.into_index())
            .expect("Invalid heap index: No item at index")
    }
}

pub type ErrorIndex = BaseIndex<ErrorHeapData>;
pub type GraphLoadingStateIndex = BaseIndex<Option<GraphLoadingStateRecord>>;
pub type ModuleEnvironmentIndex = BaseIndex<ModuleEnvironmentRecord>;
pub type ModuleNamespaceIndex = BaseIndex<ModuleNamespaceHeapData>;
pub type PromiseIndex = BaseIndex<PromiseHeapData>;
pub type SourceTextModuleIndex = BaseIndex<SourceTextModuleRecord>;
pub type StringIndex = BaseIndex<StringHeapData>;
pub type SyntheticModuleIndex = BaseIndex<SyntheticModuleRecord>;
