use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{ArgumentError, BoxError};
use crate::expression::ExprFunc;
use crate::functions::{
    downcast_arguments, ArgDescriptor, ArgKind, ArgValue, Arguments, Factory, FunctionContext, GetterKind,
};
use crate::getters::StringGetter;
use crate::Value;

/// Arguments for `SHA256(value)`.
pub struct Sha256Arguments<K> {
    value: Option<StringGetter<K>>,
}

impl<K: 'static> Arguments<K> for Sha256Arguments<K> {
    fn descriptor(&self) -> &'static [ArgDescriptor] {
        const FIELDS: &[ArgDescriptor] =
            &[ArgDescriptor::required("value", ArgKind::Getter(GetterKind::String))];
        FIELDS
    }

    fn set_field(&mut self, index: usize, value: ArgValue<K>) -> Result<(), ArgumentError> {
        match (index, value) {
            (0, ArgValue::StringGetter(getter)) => {
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

/// `SHA256(value)`: hex-encoded SHA-256 digest of the string value.
pub struct Sha256Factory;

impl<K: 'static> Factory<K> for Sha256Factory {
    fn name(&self) -> &'static str {
        "SHA256"
    }

    fn default_arguments(&self) -> Box<dyn Arguments<K>> {
        Box::new(Sha256Arguments { value: None })
    }

    fn create_function(
        &self,
        _fctx: FunctionContext,
        args: Box<dyn Arguments<K>>,
    ) -> Result<ExprFunc<K>, BoxError> {
        let args = *downcast_arguments::<K, Sha256Arguments<K>>(args)?;
        let value = args.value.ok_or("SHA256: missing value argument")?;

        Ok(Arc::new(move |ectx, tctx| {
            let text = value.get(ectx, tctx)?;
            let digest = Sha256::digest(text.as_bytes());
            let mut hex = String::with_capacity(digest.len() * 2);
            for byte in digest {
                hex.push_str(&format!("{:02x}", byte));
            }
            Ok(Value::string(hex))
        }))
    }
}
