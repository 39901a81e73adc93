use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::{Getter, Setter};
use crate::Value;

/// Arguments for `set(target, value)`.
pub struct SetArguments<K> {
    target: Option<Setter<K>>,
    value: Option<Getter<K>>,
}

impl<K: 'static> Arguments<K> for SetArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("target", ArgKind::Setter),
            ArgDescriptor::required("value", ArgKind::Getter(GetterKind::Value)),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::Setter(target)) => {
                self.target = Some(target);
                Ok(())
            }
            (1, ArgValue::Getter(getter)) => {
                self.value = Some(getter);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `set(target, value)`: stores the value at the target path. A nil value
/// leaves the target untouched.
pub struct SetFactory;

impl<K: 'static> Factory<K> for SetFactory {
    fn name(&self) -> &'static str {
        "set"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(SetArguments {
            target: None,
            value: None,
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, SetArguments<K>>(args)?;
        let target = args.target.ok_or("set: missing target argument")?;
        let value = args.value.ok_or("set: missing value argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let resolved = value.get(ectx, tctx)?;
            if !matches!(resolved, Value::Nil) {
                target.set(ectx, tctx, resolved)?;
            }
            Ok(Value::Nil)
        }))
    }
}
