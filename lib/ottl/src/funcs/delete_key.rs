use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext,
};
use crate::getters::MapGetSetter;
use crate::Value;

/// Arguments for `delete_key(target, key)`.
pub struct DeleteKeyArguments<K> {
    target: Option<MapGetSetter<K>>,
    key: Option<String>,
}

impl<K: 'static> Arguments<K> for DeleteKeyArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("target", ArgKind::MapGetSetter),
            ArgDescriptor::required("key", ArgKind::String),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::MapGetSetter(target)) => {
                self.target = Some(target);
                Ok(())
            }
            (1, ArgValue::String(key)) => {
                self.key = Some(key);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `delete_key(target, key)`: removes one key from the target map.
pub struct DeleteKeyFactory;

impl<K: 'static> Factory<K> for DeleteKeyFactory {
    fn name(&self) -> &'static str {
        "delete_key"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(DeleteKeyArguments {
            target: None,
            key: None,
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, DeleteKeyArguments<K>>(args)?;
        let target = args.target.ok_or("delete_key: missing target argument")?;
        let key = args.key.ok_or("delete_key: missing key argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let mut map = target.get(ectx, tctx)?;
            map.remove(&key);
            target.set(ectx, tctx, map)?;
            Ok(Value::Nil)
        }))
    }
}
