//! Standard function library.
//!
//! A compact set of editors (lowercase names) and converters (uppercase
//! names) covering the argument shapes the binder supports. Pipelines
//! register these alongside their own functions via [`default_functions`].

use std::sync::Arc;

use crate::functions::Factory;
use crate::parser::FunctionRegistry;

mod concat;
mod delete_key;
mod int;
mod keep_keys;
mod len;
mod replace_pattern;
mod set;
mod sha256;
mod split;

pub use concat::ConcatFactory;
pub use delete_key::DeleteKeyFactory;
pub use int::IntFactory;
pub use keep_keys::KeepKeysFactory;
pub use len::LenFactory;
pub use replace_pattern::ReplacePatternFactory;
pub use set::SetFactory;
pub use sha256::Sha256Factory;
pub use split::SplitFactory;

/// The standard registry: every function in this module, keyed by name.
pub fn default_functions<K: 'static>() -> FunctionRegistry<K> {
    let factories: Vec<Arc<dyn Factory<K>>> = vec![
        Arc::new(SetFactory),
        Arc::new(DeleteKeyFactory),
        Arc::new(KeepKeysFactory),
        Arc::new(ReplacePatternFactory),
        Arc::new(ConcatFactory),
        Arc::new(Sha256Factory),
        Arc::new(IntFactory),
        Arc::new(LenFactory),
        Arc::new(SplitFactory),
    ];
    factories
        .into_iter()
        .map(|factory| (factory.name().to_string(), factory))
        .collect()
}
