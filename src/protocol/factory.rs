use crate::error::{constants, ProtocolError, Result};
use crate::protocol::heartbeat::Heartbeat;
use crate::protocol::message::{recover, Message, MessageType};
use crate::protocol::single_string::SingleString;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

type ConstructorFn = dyn Fn(MessageType, &[u8]) -> Result<Box<dyn Message>> + Send + Sync + 'static;

/// Rehydrates a boxed message from a frame's type and payload.
pub type Constructor = Arc<ConstructorFn>;

static GLOBAL: Lazy<Arc<MessageFactory>> = Lazy::new(|| Arc::new(MessageFactory::with_builtins()));

/// Registry mapping a [`MessageType`] to the constructor that decodes it.
///
/// Entries are append-only: a type id, once registered, keeps its constructor for the
/// life of the factory. Registration is expected to finish before the factory is
/// handed to a connection; later registrations are still safe, they just race with
/// frames already in flight.
pub struct MessageFactory {
    constructors: RwLock<HashMap<MessageType, Constructor>>,
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFactory")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl MessageFactory {
    /// An empty factory. Not even the built-in kinds are registered.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A factory with [`Heartbeat`] and [`SingleString`] registered.
    pub fn with_builtins() -> Self {
        let mut constructors: HashMap<MessageType, Constructor> = HashMap::new();
        constructors.insert(MessageType::HEARTBEAT, Arc::new(Heartbeat::construct));
        constructors.insert(MessageType::SINGLE_STRING, Arc::new(SingleString::construct));
        Self {
            constructors: RwLock::new(constructors),
        }
    }

    /// The process-wide factory, built with the built-in kinds on first use.
    pub fn global() -> Arc<MessageFactory> {
        GLOBAL.clone()
    }

    pub fn register<F>(&self, message_type: MessageType, constructor: F) -> Result<()>
    where
        F: Fn(MessageType, &[u8]) -> Result<Box<dyn Message>> + Send + Sync + 'static,
    {
        let mut constructors = self
            .constructors
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_FACTORY_WRITE_LOCK.to_string()))?;

        if constructors.contains_key(&message_type) {
            return Err(ProtocolError::DuplicateType(message_type));
        }

        constructors.insert(message_type, Arc::new(constructor));
        debug!(%message_type, "Registered message type");
        Ok(())
    }

    /// Decode `payload` into the kind registered for `message_type`.
    ///
    /// An empty slice is a valid payload; kinds with a minimum length reject it in
    /// their own `unpack`. Panics raised by a constructor come back as
    /// [`ProtocolError::Panicked`].
    pub fn generate(&self, message_type: MessageType, payload: &[u8]) -> Result<Box<dyn Message>> {
        let constructor = {
            let constructors = self
                .constructors
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_FACTORY_READ_LOCK.to_string()))?;

            constructors
                .get(&message_type)
                .cloned()
                .ok_or(ProtocolError::UnknownType(message_type))?
        };

        recover("unpack", || constructor(message_type, payload))
    }

    pub fn is_registered(&self, message_type: MessageType) -> bool {
        self.constructors
            .read()
            .map(|constructors| constructors.contains_key(&message_type))
            .unwrap_or(false)
    }

    /// Registered ids in ascending order.
    pub fn registered_types(&self) -> Vec<MessageType> {
        let mut types: Vec<MessageType> = self
            .constructors
            .read()
            .map(|constructors| constructors.keys().copied().collect())
            .unwrap_or_default();
        types.sort();
        types
    }
}
