use std::sync::Arc;

use regex::Regex;

use crate::error::{ArgumentError, BoxError, EvalError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext,
    FunctionGetter, GetterKind, Optional,
};
use crate::getters::{GetSetter, Getter, StringGetter};
use crate::Value;

/// Arguments for `replace_pattern(target, pattern, replacement, function)`.
pub struct ReplacePatternArguments<K> {
    target: Option<GetSetter<K>>,
    pattern: Option<String>,
    replacement: Option<StringGetter<K>>,
    function: Optional<FunctionGetter<K>>,
}

impl<K: 'static> Arguments<K> for ReplacePatternArguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] = &[
            ArgDescriptor::required("target", ArgKind::GetSetter),
            ArgDescriptor::required("pattern", ArgKind::String),
            ArgDescriptor::required("replacement", ArgKind::Getter(GetterKind::String)),
            ArgDescriptor::optional("function", ArgKind::FunctionGetter),
        ];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::GetSetter(target)) => {
                self.target = Some(target);
                Ok(())
            }
            (1, ArgValue::String(pattern)) => {
                self.pattern = Some(pattern);
                Ok(())
            }
            (2, ArgValue::StringGetter(replacement)) => {
                self.replacement = Some(replacement);
                Ok(())
            }
            (3, ArgValue::FunctionGetter(function)) => {
                self.function.set(function);
                Ok(())
            }
            (index, _) => Err(ArgumentError::FieldMismatch { index }),
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

/// `replace_pattern(target, pattern, replacement, function)`: regex-replaces
/// every match in the target string. When the optional function reference is
/// supplied, the replacement text is passed through that function (e.g.
/// `SHA256`) before substitution. Non-string targets are left untouched.
pub struct ReplacePatternFactory;

impl<K: 'static> Factory<K> for ReplacePatternFactory {
    fn name(&self) -> &'static str {
        "replace_pattern"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(ReplacePatternArguments {
            target: None,
            pattern: None,
            replacement: None,
            function: Optional::empty(),
        })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, ReplacePatternArguments<K>>(args)?;
        let target = args.target.ok_or("replace_pattern: missing target argument")?;
        let replacement = args
            .replacement
            .ok_or("replace_pattern: missing replacement argument")?;
        let pattern = args.pattern.ok_or("replace_pattern: missing pattern argument")?;
        let compiled = Regex::new(&pattern).map_err(|e| {
            format!(
                "the regex pattern supplied to replace_pattern is not a valid pattern: {}",
                e
            )
        })?;
        let function = args.function;

        Ok(Arc::new(move |ectx, tctx| {
            let original = match target.get(ectx, tctx)? {
                Value::String(s) => s,
                _ => return Ok(Value::Nil),
            };
            let replacement_text = replacement.get(ectx, tctx)?;

            let replacement_text = match function.get() {
                Some(function) => {
                    let replacement_getter = StringGetter::new(Getter::constant(Value::String(
                        Arc::clone(&replacement_text),
                    )));
                    let expr = function.get(vec![ArgValue::StringGetter(replacement_getter)])?;
                    match expr.eval(ectx, tctx)? {
                        Value::String(s) => s,
                        other => {
                            return Err(EvalError::TypeMismatch {
                                expected: "string",
                                actual: other.type_name(),
                            })
                        }
                    }
                }
                None => replacement_text,
            };

            let updated = compiled.replace_all(&original, replacement_text.as_ref());
            if updated.as_ref() != original.as_ref() {
                target.set(ectx, tctx, Value::string(updated.into_owned()))?;
            }
            Ok(Value::Nil)
        }))
    }
}
