//! Host-side table of named native objects.
//!
//! Registration is announced to the renderer as soon as a browser link is
//! attached; objects registered earlier are announced, in registration
//! order, when it is.

use crate::binding::{CallInterceptor, NativeObject};
use indexmap::IndexMap;
use jsbridge_core::{
    BridgeMessage, NativeObjectRegistrationRequest, NativeObjectUnregistrationRequest, ProcessId,
    ProcessMessageSender,
};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// A registered object together with its optional interceptor.
#[derive(Clone)]
pub struct RegisteredObject {
    pub name: String,
    pub object: NativeObject,
    pub interceptor: Option<CallInterceptor>,
}

impl fmt::Debug for RegisteredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredObject")
            .field("name", &self.name)
            .field("methods", &self.object.method_names())
            .field("intercepted", &self.interceptor.is_some())
            .finish()
    }
}

impl RegisteredObject {
    fn registration_request(&self) -> NativeObjectRegistrationRequest {
        NativeObjectRegistrationRequest {
            object_name: self.name.clone(),
            method_names: self.object.method_names(),
        }
    }
}

#[derive(Default)]
pub struct NativeObjectRegistry {
    objects: RwLock<IndexMap<String, Arc<RegisteredObject>>>,
    // serializes registration, unregistration and browser attachment so
    // announcements reach the renderer in the order they happened
    registration_lock: Mutex<()>,
    browser: RwLock<Option<Arc<dyn ProcessMessageSender>>>,
}

impl fmt::Debug for NativeObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObjectRegistry")
            .field("objects", &self.names())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl NativeObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the link to the renderer and announces every object
    /// registered so far.
    pub fn set_browser(&self, browser: Arc<dyn ProcessMessageSender>) {
        let _guard = self.registration_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.browser.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&browser));

        let objects: Vec<_> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        info!(count = objects.len(), "Announcing registered native objects");
        for object in objects {
            Self::announce(browser.as_ref(), &object);
        }
    }

    pub fn clear_browser(&self) {
        let _guard = self.registration_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.browser.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.browser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns false when an object with this name is already registered.
    pub fn register(&self, name: impl Into<String>, object: NativeObject) -> bool {
        self.insert(name.into(), object, None)
    }

    pub fn register_with_interceptor(
        &self,
        name: impl Into<String>,
        object: NativeObject,
        interceptor: CallInterceptor,
    ) -> bool {
        self.insert(name.into(), object, Some(interceptor))
    }

    fn insert(&self, name: String, object: NativeObject, interceptor: Option<CallInterceptor>) -> bool {
        if self.contains(&name) {
            return false;
        }
        let _guard = self.registration_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let registered = {
            let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
            if objects.contains_key(&name) {
                return false;
            }
            let registered = Arc::new(RegisteredObject {
                name: name.clone(),
                object,
                interceptor,
            });
            objects.insert(name, Arc::clone(&registered));
            registered
        };
        debug!(object = %registered.name, methods = registered.object.len(), "Registered native object");

        if let Some(browser) = self.current_browser() {
            Self::announce(browser.as_ref(), &registered);
        }
        true
    }

    /// Returns false when no object with this name exists.
    pub fn unregister(&self, name: &str) -> bool {
        let _guard = self.registration_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
            .is_some();
        if !removed {
            return false;
        }
        debug!(object = %name, "Unregistered native object");

        if let Some(browser) = self.current_browser() {
            let request = NativeObjectUnregistrationRequest {
                object_name: name.to_string(),
            };
            match request.to_process_message() {
                Ok(message) => {
                    if let Err(e) = browser.send_process_message(ProcessId::Renderer, message) {
                        warn!(object = %name, error = %e, "Failed to announce unregistration");
                    }
                }
                Err(e) => warn!(object = %name, error = %e, "Failed to encode unregistration"),
            }
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredObject>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn current_browser(&self) -> Option<Arc<dyn ProcessMessageSender>> {
        self.browser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn announce(browser: &dyn ProcessMessageSender, object: &RegisteredObject) {
        let result = object
            .registration_request()
            .to_process_message()
            .and_then(|message| browser.send_process_message(ProcessId::Renderer, message));
        if let Err(e) = result {
            warn!(object = %object.name, error = %e, "Failed to announce native object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ObjectBuilder;
    use jsbridge_core::{BridgeError, ProcessMessage};

    #[derive(Debug, Default)]
    struct RecordingSender {
        sent: Mutex<Vec<ProcessMessage>>,
    }

    impl ProcessMessageSender for RecordingSender {
        fn send_process_message(&self, target: ProcessId, message: ProcessMessage) -> Result<(), BridgeError> {
            assert_eq!(target, ProcessId::Renderer);
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn calc() -> NativeObject {
        ObjectBuilder::new()
            .method("add", |a: i32, b: i32| a + b)
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = NativeObjectRegistry::new();
        assert!(registry.register("calc", calc()));
        assert!(!registry.register("calc", calc()));
        assert_eq!(registry.names(), vec!["calc"]);
    }

    #[test]
    fn test_unregister_missing_returns_false() {
        let registry = NativeObjectRegistry::new();
        assert!(!registry.unregister("nothing"));
        assert!(registry.register("calc", calc()));
        assert!(registry.unregister("calc"));
        assert!(registry.get("calc").is_none());
    }

    #[test]
    fn test_deferred_announcements_in_order() {
        let registry = NativeObjectRegistry::new();
        registry.register("first", calc());
        registry.register("second", calc());

        let sender = Arc::new(RecordingSender::default());
        registry.set_browser(sender.clone());
        registry.register("third", calc());
        registry.unregister("first");

        let sent = sender.sent.lock().unwrap();
        let names: Vec<_> = sent.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                NativeObjectRegistrationRequest::NAME,
                NativeObjectRegistrationRequest::NAME,
                NativeObjectRegistrationRequest::NAME,
                NativeObjectUnregistrationRequest::NAME,
            ]
        );
        let first = NativeObjectRegistrationRequest::from_process_message(&sent[0]).unwrap();
        assert_eq!(first.object_name, "first");
        assert_eq!(first.method_names, vec!["add"]);
        let third = NativeObjectRegistrationRequest::from_process_message(&sent[2]).unwrap();
        assert_eq!(third.object_name, "third");
    }
}
