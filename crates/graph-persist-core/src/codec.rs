//! Pluggable encode/decode/clone primitives.
//!
//! A `Codec` turns a graph into bytes and back, and produces independent
//! deep copies for history snapshots. The default [`BincodeCodec`] writes a
//! short header followed by a bincode-encoded [`GraphImage`].

use std::io::{Read, Write};

use crate::error::CodecError;
use crate::graph::{self, GraphImage, FORMAT_VERSION};
use crate::schema::{Record, Schema};
use crate::tracked::Tracked;

/// Serialization strategy used by `Persister`.
pub trait Codec: Send + Sync + 'static {
    /// Writes the graph under `root` to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not the schema's root type, or if
    /// encoding or writing fails.
    fn encode<T: Record>(
        &self,
        schema: &Schema,
        root: &Tracked<T>,
        sink: &mut dyn Write,
    ) -> Result<(), CodecError>;

    /// Reads a graph written by `encode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a graph of the schema's shape.
    fn decode<T: Record>(&self, schema: &Schema, source: &mut dyn Read)
        -> Result<Tracked<T>, CodecError>;

    /// An independent copy of the graph, sharing and cycles included.
    fn deep_clone<T: Record>(
        &self,
        schema: &Schema,
        root: &Tracked<T>,
    ) -> Result<Tracked<T>, CodecError> {
        graph::deep_clone(schema, root)
    }
}

/// File header of the bincode format.
const MAGIC: &[u8; 4] = b"GPST";

/// Compact binary codec backed by `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn write_image(image: &GraphImage, sink: &mut dyn Write) -> Result<(), CodecError> {
        let bytes = bincode::serialize(image)?;
        sink.write_all(MAGIC)?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Reads the raw image without rebuilding any record, e.g. for
    /// inspection tools that do not know the record types.
    pub fn read_image(source: &mut dyn Read) -> Result<GraphImage, CodecError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let body = bytes.strip_prefix(MAGIC).ok_or(CodecError::BadMagic)?;
        let image: GraphImage = bincode::deserialize(body)?;
        if image.version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(image.version));
        }
        Ok(image)
    }
}

impl Codec for BincodeCodec {
    fn encode<T: Record>(
        &self,
        schema: &Schema,
        root: &Tracked<T>,
        sink: &mut dyn Write,
    ) -> Result<(), CodecError> {
        let image = graph::capture(schema, root)?;
        Self::write_image(&image, sink)
    }

    fn decode<T: Record>(
        &self,
        schema: &Schema,
        source: &mut dyn Read,
    ) -> Result<Tracked<T>, CodecError> {
        let image = Self::read_image(source)?;
        graph::restore(schema, &image)
    }
}
