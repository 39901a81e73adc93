use std::sync::Arc;

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::StringGetter;
use crate::Value;

/// Arguments for `Split(target, delimiter)`.
pub struct SplitArguments<K> {
    target: Option<StringGetter<K>>,
    delimiter: Option<String>,
}

impl<K: 'static> Arguments<K> for SplitArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("target", ArgKind::Getter(GetterKind::String)),
            ArgDescriptor::required("delimiter", ArgKind::String),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::StringGetter(getter)) => {
                self.target = Some(getter);
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

/// `Split(target, delimiter)`: splits the string into a list of substrings.
pub struct SplitFactory;

impl<K: 'static> Factory<K> for SplitFactory {
    fn name(&self) -> &'static str {
        "Split"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(SplitArguments {
            target: None,
            delimiter: None,
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, SplitArguments<K>>(args)?;
        let target = args.target.ok_or("Split: missing target argument")?;
        let delimiter = args.delimiter.ok_or("Split: missing delimiter argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let text = target.get(ectx, tctx)?;
            let parts = text
                .split(delimiter.as_str())
                .map(Value::string)
                .collect::<Vec<Value>>();
            Ok(Value::List(parts))
        }))
    }
}
