use replica_common::NetId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::component::ComponentError;

/// A typed state payload bound to one network id.
pub trait StatePayload: Serialize + DeserializeOwned {
    const NET_ID: NetId;
    const VERSION: u16 = 1;
}

/// Opaque, versioned component data addressed by network id.
///
/// The data is CBOR; only the component owning `net_id` knows its shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    pub net_id: NetId,
    pub version: u16,
    pub data: Vec<u8>,
}

impl ComponentState {
    pub fn new(net_id: NetId, version: u16, data: Vec<u8>) -> Self {
        Self {
            net_id,
            version,
            data,
        }
    }

    pub fn encode<P: StatePayload>(payload: &P) -> Result<Self, ComponentError> {
        let mut data = Vec::new();
        ciborium::into_writer(payload, &mut data)
            .map_err(|e| ComponentError::Encode(e.to_string()))?;
        Ok(Self::new(P::NET_ID, P::VERSION, data))
    }

    /// Decode as `P`, checking the network id and payload version first.
    pub fn decode<P: StatePayload>(&self) -> Result<P, ComponentError> {
        if self.net_id != P::NET_ID {
            return Err(ComponentError::WrongNetId {
                expected: P::NET_ID,
                got: self.net_id,
            });
        }
        if self.version != P::VERSION {
            return Err(ComponentError::UnsupportedVersion {
                net_id: self.net_id,
                expected: P::VERSION,
                found: self.version,
            });
        }
        ciborium::from_reader(self.data.as_slice()).map_err(|e| ComponentError::Decode(e.to_string()))
    }
}
