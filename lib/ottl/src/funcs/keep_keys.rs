use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext,
};
use crate::getters::MapGetSetter;
use crate::Value;

/// Arguments for `keep_keys(target, keys)`.
pub struct KeepKeysArguments<K> {
    target: Option<MapGetSetter<K>>,
    keys: Option<Vec<String>>,
}

impl<K: 'static> Arguments<K> for KeepKeysArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("target", ArgKind::MapGetSetter),
            ArgDescriptor::required("keys", ArgKind::StringSlice),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::MapGetSetter(target)) => {
                self.target = Some(target);
                Ok(())
            }
            (1, ArgValue::StringSlice(keys)) => {
                self.keys = Some(keys);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `keep_keys(target, keys)`: drops every map entry whose key is not in
/// the keep list.
pub struct KeepKeysFactory;

impl<K: 'static> Factory<K> for KeepKeysFactory {
    fn name(&self) -> &'static str {
        "keep_keys"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(KeepKeysArguments {
            target: None,
            keys: None,
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, KeepKeysArguments<K>>(args)?;
        let target = args.target.ok_or("keep_keys: missing target argument")?;
        let keys = args.keys.ok_or("keep_keys: missing keys argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let mut map = target.get(ectx, tctx)?;
            map.retain(|key, _| keys.iter().any(|keep| keep == key));
            target.set(ectx, tctx, map)?;
            Ok(Value::Nil)
        }))
    }
}
