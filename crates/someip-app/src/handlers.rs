//! Handler registration and dispatch keys (§4.7).
//!
//! A registered handler key may use the `ANY_*` wildcards from
//! [`someip_proto::ids`] to register a catch-all; [`HandlerRegistry::find`]
//! tries the exact key first and falls back to progressively broader
//! wildcard keys.

use std::{collections::HashMap, sync::Arc};

use someip_proto::{
    ids::{ANY_INSTANCE, ANY_METHOD, ANY_SERVICE, InstanceId, MethodId, ServiceId},
    message::SomeipMessage,
};
use someip_core::ServiceKey;

/// Called with every inbound message matching its registration key.
pub type MessageHandler = Arc<dyn Fn(SomeipMessage) + Send + Sync>;

/// Called whenever a service's availability changes.
pub type AvailabilityHandler = Arc<dyn Fn(ServiceKey, bool) + Send + Sync>;

/// `(service_id, instance_id, method_id)`, a message handler's registration
/// key. Any field may be one of the `ANY_*` wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey {
    /// Service the handler applies to, or [`ANY_SERVICE`].
    pub service_id: ServiceId,
    /// Instance the handler applies to, or [`ANY_INSTANCE`].
    pub instance_id: InstanceId,
    /// Method the handler applies to, or [`ANY_METHOD`].
    pub method_id: MethodId,
}

/// Per-application handler tables, owned by the reactor task.
#[derive(Default)]
pub struct HandlerRegistry {
    message_handlers: HashMap<MethodKey, MessageHandler>,
    availability_handlers: HashMap<ServiceKey, AvailabilityHandler>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `key`.
    pub fn register_message_handler(&mut self, key: MethodKey, handler: MessageHandler) {
        self.message_handlers.insert(key, handler);
    }

    /// Register (or replace) the availability handler for `key`. A
    /// `service_id` of [`ANY_SERVICE`] registers a catch-all.
    pub fn register_availability_handler(&mut self, key: ServiceKey, handler: AvailabilityHandler) {
        self.availability_handlers.insert(key, handler);
    }

    /// Find the most specific registered message handler for an inbound
    /// message, trying exact match before each broader wildcard.
    #[must_use]
    pub fn find_message_handler(&self, service_id: ServiceId, instance_id: InstanceId, method_id: MethodId) -> Option<&MessageHandler> {
        for candidate_instance in [instance_id, ANY_INSTANCE] {
            for candidate_method in [method_id, ANY_METHOD] {
                let key = MethodKey { service_id, instance_id: candidate_instance, method_id: candidate_method };
                if let Some(handler) = self.message_handlers.get(&key) {
                    return Some(handler);
                }
            }
        }
        let wildcard = MethodKey { service_id: ANY_SERVICE, instance_id: ANY_INSTANCE, method_id: ANY_METHOD };
        self.message_handlers.get(&wildcard)
    }

    /// Find the most specific registered availability handler for `key`.
    #[must_use]
    pub fn find_availability_handler(&self, key: ServiceKey) -> Option<&AvailabilityHandler> {
        self.availability_handlers.get(&key).or_else(|| {
            self.availability_handlers.get(&ServiceKey::new(ANY_SERVICE, ANY_INSTANCE))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use someip_proto::enums::{MessageType, ReturnCode};

    use super::*;

    #[test]
    fn exact_handler_beats_wildcard() {
        let mut registry = HandlerRegistry::new();
        let exact_fired = Arc::new(AtomicBool::new(false));
        let wildcard_fired = Arc::new(AtomicBool::new(false));

        {
            let flag = Arc::clone(&exact_fired);
            registry.register_message_handler(
                MethodKey { service_id: 0x1234, instance_id: 1, method_id: 0x0001 },
                Arc::new(move |_| flag.store(true, Ordering::SeqCst)),
            );
        }
        {
            let flag = Arc::clone(&wildcard_fired);
            registry.register_message_handler(
                MethodKey { service_id: ANY_SERVICE, instance_id: ANY_INSTANCE, method_id: ANY_METHOD },
                Arc::new(move |_| flag.store(true, Ordering::SeqCst)),
            );
        }

        let handler = registry.find_message_handler(0x1234, 1, 0x0001).unwrap();
        handler(SomeipMessage::new(0x1234, 0x0001, 1, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new()));
        assert!(exact_fired.load(Ordering::SeqCst));
        assert!(!wildcard_fired.load(Ordering::SeqCst));
    }

    #[test]
    fn unregistered_method_falls_back_to_wildcard() {
        let mut registry = HandlerRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        registry.register_message_handler(
            MethodKey { service_id: ANY_SERVICE, instance_id: ANY_INSTANCE, method_id: ANY_METHOD },
            Arc::new(move |_| flag.store(true, Ordering::SeqCst)),
        );

        let handler = registry.find_message_handler(0x9999, 1, 0x0002).unwrap();
        handler(SomeipMessage::new(0x9999, 0x0002, 1, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new()));
        assert!(fired.load(Ordering::SeqCst));
    }
}
