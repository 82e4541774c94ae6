use super::descriptor::{to_camel_case, MethodDescriptor};
use super::handler::{AsyncHandler, ParameterList, SyncHandler};
use super::{Invocable, NativeMethod};
use indexmap::IndexMap;
use jsbridge_core::BridgeError;
use std::sync::Arc;

/// A native object ready for registration: its methods keyed by the
/// script-visible name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct NativeObject {
    methods: IndexMap<String, NativeMethod>,
}

impl NativeObject {
    pub fn builder() -> ObjectBuilder {
        ObjectBuilder::new()
    }

    pub fn method(&self, name: &str) -> Option<&NativeMethod> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Collects methods for a [`NativeObject`]. Names are exposed in lower camel
/// case. The first invalid declaration is reported by [`ObjectBuilder::build`].
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    methods: IndexMap<String, NativeMethod>,
    error: Option<BridgeError>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<Args, H>(self, name: &str, handler: H) -> Self
    where
        H: SyncHandler<Args>,
    {
        self.add(name, H::parameters(), handler.into_invocable())
    }

    pub fn async_method<Args, H>(self, name: &str, handler: H) -> Self
    where
        H: AsyncHandler<Args>,
    {
        self.add(name, H::parameters(), handler.into_invocable())
    }

    fn add(mut self, name: &str, parameters: ParameterList, body: Arc<dyn Invocable>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = to_camel_case(name);
        if name.is_empty() {
            self.error = Some(BridgeError::invalid_argument("Method name cannot be empty"));
            return self;
        }
        if self.methods.contains_key(&name) {
            self.error = Some(BridgeError::invalid_argument(format!(
                "Object already has a method named {}",
                name
            )));
            return self;
        }
        match MethodDescriptor::new(name.clone(), parameters) {
            Ok(descriptor) => {
                self.methods.insert(name, NativeMethod::new(descriptor, body));
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn build(self) -> Result<NativeObject, BridgeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(NativeObject {
                methods: self.methods,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::{ErrorCode, Params};

    #[test]
    fn test_names_are_camel_cased_in_order() {
        let object = ObjectBuilder::new()
            .method("Add", |a: i32, b: i32| a + b)
            .method("get_value", || 1)
            .build()
            .unwrap();
        assert_eq!(object.method_names(), vec!["add", "getValue"]);
        assert!(object.method("Add").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ObjectBuilder::new()
            .method("add", |a: i32| a)
            .method("Add", |a: i32| a)
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_variadic_not_last_rejected() {
        let err = ObjectBuilder::new()
            .method("bad", |rest: Params<i32>, last: i32| rest.len() as i32 + last)
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_descriptor_records_variadic() {
        let object = ObjectBuilder::new()
            .method("sum", |values: Params<f64>| values.0.iter().sum::<f64>())
            .build()
            .unwrap();
        let descriptor = object.method("sum").unwrap().descriptor();
        assert!(descriptor.mandatory_parameters().is_empty());
        assert!(descriptor.variadic_parameter().is_some());
    }
}
