use crate::chain::ChainId;
use crate::message::MessageId;
use crate::vaa::Vaa;

/// Something this guardian is willing to sign.
///
/// Both variants carry the unsigned VAA whose body is signed; they differ in
/// where it came from and whether the network can be asked to observe it
/// again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Observed on a source chain by one of our watchers.
    Message(Box<Vaa>),
    /// Injected by the operator (governance and similar). Never re-observed.
    Injected(Box<Vaa>),
}

impl Observation {
    pub fn vaa(&self) -> &Vaa {
        match self {
            Observation::Message(vaa) | Observation::Injected(vaa) => vaa,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.vaa().message_id()
    }

    pub fn emitter_chain(&self) -> ChainId {
        self.vaa().emitter_chain
    }

    /// Whether a re-observation request can recover this observation.
    pub fn is_reliable(&self) -> bool {
        match self {
            Observation::Message(_) => true,
            Observation::Injected(_) => false,
        }
    }

    /// Short label for logs and metrics.
    pub fn source(&self) -> &'static str {
        match self {
            Observation::Message(_) => "message",
            Observation::Injected(_) => "injected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VAA_VERSION;

    fn vaa() -> Box<Vaa> {
        Box::new(Vaa {
            version: VAA_VERSION,
            guardian_set_index: 0,
            signatures: vec![],
            timestamp: 1,
            nonce: 2,
            emitter_chain: ChainId::ETHEREUM,
            emitter_address: [1u8; 32],
            sequence: 3,
            consistency_level: 0,
            payload: vec![],
        })
    }

    #[test]
    fn test_variants() {
        let msg = Observation::Message(vaa());
        let injected = Observation::Injected(vaa());
        assert!(msg.is_reliable());
        assert!(!injected.is_reliable());
        assert_eq!(msg.source(), "message");
        assert_eq!(injected.source(), "injected");
        assert_eq!(msg.message_id(), injected.message_id());
        assert_eq!(msg.emitter_chain(), ChainId::ETHEREUM);
    }
}
