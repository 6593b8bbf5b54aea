//! User defined attachments.
//!
//! Propositions, proof trace entries and assumptions can carry a payload. Payloads are stored as a
//! `(tag, bytes)` record and restored by the decoder registered for the tag in a
//! [`PayloadRegistry`]. There is no global registry, every deserialization call receives the
//! registry to use.
use std::any::Any;
use std::fmt;
use std::io::{self, BufRead, Write};

use anyhow::Error;
use log::debug;
use rustc_hash::FxHashMap;

use flatsat_formula::FormulaFactory;
use flatsat_internal_codec::{read_bytes, read_u32, write_bytes, write_u32, CodecError};

use crate::error::SerialError;

/// Identifies the decoder of a payload.
pub type PayloadTag = u32;

/// A value that can be attached to propositions, proof entries and assumptions.
pub trait Payload: Any + fmt::Debug {
    /// Tag of the decoder that restores this payload.
    fn tag(&self) -> PayloadTag;

    /// Encodes the payload.
    fn to_bytes(&self) -> Vec<u8>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Payload {
    /// The concrete payload if it has type `T`.
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Payloads are equal if they have the same tag and encoding.
impl PartialEq for dyn Payload {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.to_bytes() == other.to_bytes()
    }
}

/// Serialized form of a payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PayloadRecord {
    pub tag: PayloadTag,
    pub bytes: Vec<u8>,
}

impl PayloadRecord {
    pub fn from_payload(payload: &dyn Payload) -> PayloadRecord {
        PayloadRecord {
            tag: payload.tag(),
            bytes: payload.to_bytes(),
        }
    }
}

pub(crate) fn write_payload_record(
    target: &mut impl Write,
    record: &PayloadRecord,
) -> io::Result<()> {
    write_u32(&mut *target, record.tag)?;
    write_bytes(&mut *target, &record.bytes)
}

pub(crate) fn read_payload_record(source: &mut impl BufRead) -> Result<PayloadRecord, CodecError> {
    Ok(PayloadRecord {
        tag: read_u32(&mut *source)?,
        bytes: read_bytes(&mut *source)?,
    })
}

type Decoder = Box<dyn Fn(&[u8], &mut FormulaFactory) -> Result<Box<dyn Payload>, Error>>;

/// Decoders for payloads, indexed by tag.
#[derive(Default)]
pub struct PayloadRegistry {
    decoders: FxHashMap<PayloadTag, Decoder>,
}

impl PayloadRegistry {
    /// An empty registry.
    pub fn new() -> PayloadRegistry {
        PayloadRegistry::default()
    }

    /// A registry that can decode [`StandardProposition`](crate::StandardProposition) payloads.
    pub fn with_standard_propositions() -> PayloadRegistry {
        let mut registry = PayloadRegistry::new();
        registry.register(
            crate::proposition::STANDARD_PROPOSITION_TAG,
            crate::proposition::decode_standard_proposition,
        );
        registry
    }

    /// Registers the decoder for `tag`, replacing any previous decoder.
    ///
    /// The decoder receives the bytes produced by [`Payload::to_bytes`] and the factory used for
    /// any formulas contained in the payload.
    pub fn register<T, F>(&mut self, tag: PayloadTag, decoder: F) -> &mut PayloadRegistry
    where
        T: Payload,
        F: Fn(&[u8], &mut FormulaFactory) -> Result<T, Error> + 'static,
    {
        let decoder: Decoder = Box::new(move |bytes: &[u8], factory: &mut FormulaFactory| {
            decoder(bytes, factory).map(|payload| Box::new(payload) as Box<dyn Payload>)
        });
        if self.decoders.insert(tag, decoder).is_some() {
            debug!("Replaced decoder for payload tag {}", tag);
        }
        self
    }

    pub fn is_registered(&self, tag: PayloadTag) -> bool {
        self.decoders.contains_key(&tag)
    }

    /// Restores a payload from its record.
    pub fn decode(
        &self,
        record: &PayloadRecord,
        factory: &mut FormulaFactory,
    ) -> Result<Box<dyn Payload>, SerialError> {
        let decoder = self
            .decoders
            .get(&record.tag)
            .ok_or(SerialError::UnregisteredPayloadType { tag: record.tag })?;

        let payload = decoder(&record.bytes, factory).map_err(|cause| {
            SerialError::PayloadDecode {
                tag: record.tag,
                cause,
            }
        })?;

        if payload.tag() != record.tag {
            return Err(SerialError::PayloadDecode {
                tag: record.tag,
                cause: anyhow::anyhow!("decoder produced a payload with tag {}", payload.tag()),
            });
        }

        Ok(payload)
    }
}

impl fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("PayloadRegistry")
            .field("tags", &tags)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::convert::TryInto;

    /// Payload used throughout the tests.
    #[derive(Clone, PartialEq, Debug)]
    pub struct Label(pub u64);

    pub const LABEL_TAG: PayloadTag = 42;

    impl Payload for Label {
        fn tag(&self) -> PayloadTag {
            LABEL_TAG
        }

        fn to_bytes(&self) -> Vec<u8> {
            self.0.to_le_bytes().to_vec()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    pub fn decode_label(bytes: &[u8], _: &mut FormulaFactory) -> Result<Label, Error> {
        let bytes: [u8; 8] = bytes.try_into()?;
        Ok(Label(u64::from_le_bytes(bytes)))
    }

    pub fn label_registry() -> PayloadRegistry {
        let mut registry = PayloadRegistry::new();
        registry.register(LABEL_TAG, decode_label);
        registry
    }

    #[test]
    fn registered_tag_decodes() {
        let registry = label_registry();
        let record = PayloadRecord::from_payload(&Label(7));
        assert_eq!(record.tag, LABEL_TAG);

        let payload = registry
            .decode(&record, &mut FormulaFactory::caching())
            .unwrap();
        assert_eq!(payload.downcast_ref::<Label>(), Some(&Label(7)));
    }

    #[test]
    fn unregistered_tag_fails() {
        let registry = PayloadRegistry::new();
        let record = PayloadRecord::from_payload(&Label(7));

        match registry.decode(&record, &mut FormulaFactory::caching()) {
            Err(SerialError::UnregisteredPayloadType { tag: LABEL_TAG }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn decoder_errors_are_wrapped() {
        let registry = label_registry();
        let record = PayloadRecord {
            tag: LABEL_TAG,
            bytes: vec![1, 2, 3],
        };

        match registry.decode(&record, &mut FormulaFactory::caching()) {
            Err(SerialError::PayloadDecode { tag: LABEL_TAG, .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn decoder_with_wrong_tag() {
        let mut registry = PayloadRegistry::new();
        registry.register(7, decode_label);
        let record = PayloadRecord {
            tag: 7,
            bytes: Label(1).to_bytes(),
        };

        assert!(registry
            .decode(&record, &mut FormulaFactory::caching())
            .is_err());
    }

    #[test]
    fn record_codec() {
        let record = PayloadRecord::from_payload(&Label(u64::max_value()));
        let mut buf = vec![];
        write_payload_record(&mut buf, &record).unwrap();
        assert_eq!(read_payload_record(&mut &buf[..]).unwrap(), record);
    }

    #[test]
    fn payload_equality() {
        let a: Box<dyn Payload> = Box::new(Label(1));
        let b: Box<dyn Payload> = Box::new(Label(1));
        let c: Box<dyn Payload> = Box::new(Label(2));
        assert!(a == b);
        assert!(a != c);
    }
}
