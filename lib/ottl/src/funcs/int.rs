use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::IntLikeGetter;
use crate::Value;

/// Arguments for `Int(value)`.
pub struct IntArguments<K> {
    value: Option<IntLikeGetter<K>>,
}

impl<K: 'static> Arguments<K> for IntArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] =
            &[ArgDescriptor::required("value", ArgKind::Getter(GetterKind::IntLike))];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::IntLikeGetter(getter)) => {
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

/// `Int(value)`: coerces the value to an int; nil stays nil.
pub struct IntFactory;

impl<K: 'static> Factory<K> for IntFactory {
    fn name(&self) -> &'static str {
        "Int"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(IntArguments { value: None })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, IntArguments<K>>(args)?;
        let value = args.value.ok_or("Int: missing value argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            Ok(match value.get(ectx, tctx)? {
                Some(int) => Value::Int(int),
                None => Value::Nil,
            })
        }))
    }
}
