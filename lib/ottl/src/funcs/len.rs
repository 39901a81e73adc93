use std::sync::Arc;

use crate::error::{ArgumentError, BoxError, EvalError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::Getter;
use crate::Value;

/// Arguments for `Len(target)`.
pub struct LenArguments<K> {
    target: Option<Getter<K>>,
}

impl<K: 'static> Arguments<K> for LenArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] =
            &[ArgDescriptor::required("target", ArgKind::Getter(GetterKind::Value))];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::Getter(getter)) => {
                self.target = Some(getter);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `Len(target)`: length of a string (bytes), byte blob, list, or map.
pub struct LenFactory;

impl<K: 'static> Factory<K> for LenFactory {
    fn name(&self) -> &'static str {
        "Len"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(LenArguments { target: None })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, LenArguments<K>>(args)?;
        let target = args.target.ok_or("Len: missing target argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let length = match target.get(ectx, tctx)? {
                Value::String(s) => s.len(),
                Value::Bytes(b) => b.len(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "string, bytes, list, or map",
                        actual: other.type_name(),
                    })
                }
            };
            Ok(Value::Int(length as i64))
        }))
    }
}
