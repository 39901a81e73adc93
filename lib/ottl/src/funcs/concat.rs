use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::StringLikeGetter;
use crate::Value;

/// Arguments for `Concat(vals, delimiter)`.
pub struct ConcatArguments<K> {
    vals: Option<Vec<StringLikeGetter<K>>>,
    delimiter: Option<String>,
}

impl<K: 'static> Arguments<K> for ConcatArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("vals", ArgKind::GetterSlice(GetterKind::StringLike)),
            ArgDescriptor::required("delimiter", ArgKind::String),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, value @ ArgValue::List(_)) => {
                self.vals = Some(value.into_slice_of::<StringLikeGetter<K>>()?);
                Ok(())
            }
            (1, ArgValue::String(delimiter)) => {
                self.delimiter = Some(delimiter);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `Concat(vals, delimiter)`: renders every value as a string and joins
/// them with the delimiter, skipping nils.
pub struct ConcatFactory;

impl<K: 'static> Factory<K> for ConcatFactory {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(ConcatArguments {
            vals: None,
            delimiter: None,
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, ConcatArguments<K>>(args)?;
        let vals = args.vals.ok_or("Concat: missing vals argument")?;
        let delimiter = args.delimiter.ok_or("Concat: missing delimiter argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let mut rendered = Vec::with_capacity(vals.len());
            for val in &vals {
                if let Some(text) = val.get(ectx, tctx)? {
                    rendered.push(text);
                }
            }
            Ok(Value::string(rendered.join(&delimiter)))
        }))
    }
}
