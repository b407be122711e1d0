//! Sub-format dispatch for archive entries
//!
//! Every entry is offered to an ordered chain of strategies. The first one that accepts the
//! entry decides its payload:
//!
//! 1. [`TagStrategy`] sniffs the first four bytes and looks up a decoder registered for that
//!    tag. A failure there is fatal for the archive.
//! 2. [`ExtensionStrategy`] maps the file extension to a tag. A failure there is reported as
//!    [`Error::UnknownSubFormat`] and the chain moves on.
//! 3. [`OpaqueStrategy`] accepts everything and keeps the bytes as they are.

use std::fmt::Debug;
use std::io::Cursor;
use std::sync::Arc;

use gpk_container::{types::Tag, CodecConfig, Container};
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// Decoded form of an archive entry
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EntryPayload {
    /// No decoder applies, only the raw bytes are available
    #[default]
    Opaque,
    /// A typed container
    Container(Box<Container>),
}

impl EntryPayload {
    pub fn label(&self) -> &'static str {
        match self {
            EntryPayload::Opaque => "raw",
            EntryPayload::Container(_) => "container",
        }
    }
}

/// Decoder for one sub-format, keyed by the tag its data starts with
pub trait FormatDecoder: Debug + Send + Sync {
    fn tag(&self) -> Tag;
    fn decode(&self, data: &[u8]) -> Result<EntryPayload>;
}

/// Decodes typed containers
#[derive(Debug, Clone, Default)]
pub struct ContainerDecoder {
    pub config: CodecConfig,
}

impl FormatDecoder for ContainerDecoder {
    fn tag(&self) -> Tag {
        Tag::CONTAINER
    }

    fn decode(&self, data: &[u8]) -> Result<EntryPayload> {
        let container = Container::read(&mut Cursor::new(data), &self.config)?;
        Ok(EntryPayload::Container(Box::new(container)))
    }
}

/// Known decoders by tag, and the file extensions that imply a tag
#[derive(Debug, Clone, Default)]
pub struct DecoderRegistry {
    decoders: IndexMap<Tag, Arc<dyn FormatDecoder>>,
    extensions: IndexMap<String, Tag>,
}

impl DecoderRegistry {
    /// Register a decoder, replacing any previous decoder for the same tag
    pub fn register(&mut self, decoder: Arc<dyn FormatDecoder>) {
        self.decoders.insert(decoder.tag(), decoder);
    }

    /// Map a file extension (without the dot, case insensitive) to a tag
    pub fn register_extension(&mut self, extension: &str, tag: Tag) {
        self.extensions.insert(extension.to_ascii_lowercase(), tag);
    }

    pub fn by_tag(&self, tag: Tag) -> Option<&Arc<dyn FormatDecoder>> {
        self.decoders.get(&tag)
    }

    pub fn by_extension(&self, name: &str) -> Option<&Arc<dyn FormatDecoder>> {
        let (_, extension) = name.rsplit_once('.')?;
        let tag = self.extensions.get(&extension.to_ascii_lowercase())?;
        self.by_tag(*tag)
    }
}

/// One tier of the decoder chain
///
/// Returns `Ok(None)` when the strategy does not apply to the entry.
pub trait DecodeStrategy: Debug + Send + Sync {
    fn try_decode(
        &self,
        registry: &DecoderRegistry,
        name: &str,
        data: &[u8],
    ) -> Result<Option<EntryPayload>>;
}

/// Dispatch on the tag sniffed from the entry data
#[derive(Debug, Clone, Copy, Default)]
pub struct TagStrategy;

impl DecodeStrategy for TagStrategy {
    fn try_decode(
        &self,
        registry: &DecoderRegistry,
        _name: &str,
        data: &[u8],
    ) -> Result<Option<EntryPayload>> {
        let Some(decoder) = Tag::sniff(data).and_then(|tag| registry.by_tag(tag)) else {
            return Ok(None);
        };
        decoder.decode(data).map(Some)
    }
}

/// Dispatch on the file extension of the entry name
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionStrategy;

impl DecodeStrategy for ExtensionStrategy {
    fn try_decode(
        &self,
        registry: &DecoderRegistry,
        name: &str,
        data: &[u8],
    ) -> Result<Option<EntryPayload>> {
        let Some(decoder) = registry.by_extension(name) else {
            return Ok(None);
        };
        decoder
            .decode(data)
            .map(Some)
            .map_err(|e| Error::UnknownSubFormat {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Keeps the raw bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueStrategy;

impl DecodeStrategy for OpaqueStrategy {
    fn try_decode(
        &self,
        _registry: &DecoderRegistry,
        _name: &str,
        _data: &[u8],
    ) -> Result<Option<EntryPayload>> {
        Ok(Some(EntryPayload::Opaque))
    }
}

/// Ordered strategies sharing one decoder registry
#[derive(Debug, Clone)]
pub struct DecoderChain {
    registry: DecoderRegistry,
    strategies: Vec<Arc<dyn DecodeStrategy>>,
}

impl Default for DecoderChain {
    fn default() -> Self {
        DecoderChain::standard(&CodecConfig::default())
    }
}

impl DecoderChain {
    pub fn new(registry: DecoderRegistry, strategies: Vec<Arc<dyn DecodeStrategy>>) -> Self {
        DecoderChain {
            registry,
            strategies,
        }
    }

    /// Tag, extension and opaque tiers with the container decoder registered
    pub fn standard(config: &CodecConfig) -> Self {
        let mut registry = DecoderRegistry::default();
        registry.register(Arc::new(ContainerDecoder {
            config: config.clone(),
        }));
        registry.register_extension("gctr", Tag::CONTAINER);

        DecoderChain::new(
            registry,
            vec![
                Arc::new(TagStrategy),
                Arc::new(ExtensionStrategy),
                Arc::new(OpaqueStrategy),
            ],
        )
    }

    /// A chain that never decodes
    pub fn opaque() -> Self {
        DecoderChain::new(DecoderRegistry::default(), vec![Arc::new(OpaqueStrategy)])
    }

    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    #[instrument(skip(self, data), err, fields(size = data.len()))]
    pub fn decode(&self, name: &str, data: &[u8]) -> Result<EntryPayload> {
        for strategy in &self.strategies {
            match strategy.try_decode(&self.registry, name, data) {
                Ok(Some(payload)) => {
                    debug!("decoded as {} by {:?}", payload.label(), strategy);
                    return Ok(payload);
                }
                Ok(None) => continue,
                Err(e @ Error::UnknownSubFormat { .. }) => {
                    warn!("{e}, falling back");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::UnknownSubFormat {
            name: name.to_string(),
            reason: "no strategy accepted the entry".to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use gpk_container::{types::Tag, CodecConfig, Container};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::dispatch::{
        DecoderChain, DecoderRegistry, EntryPayload, ExtensionStrategy, TagStrategy,
    };
    use crate::error::{Error, Result};

    fn container_bytes() -> Result<Vec<u8>> {
        let mut container = Container::new(b"empty.gctr".to_vec());
        Ok(container.write(&CodecConfig::default())?)
    }

    #[test]
    fn sniffs_containers() -> Result<()> {
        let chain = DecoderChain::default();
        let payload = chain.decode("anything.bin", &container_bytes()?)?;

        assert_eq!(payload.label(), "container");

        Ok(())
    }

    #[test]
    fn unknown_data_is_opaque() -> Result<()> {
        let chain = DecoderChain::default();

        assert_eq!(chain.decode("notes.txt", b"hello")?, EntryPayload::Opaque);
        assert_eq!(chain.decode("tiny", b"ab")?, EntryPayload::Opaque);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn extension_failure_falls_back() -> Result<()> {
        let chain = DecoderChain::default();
        let payload = chain.decode("broken.gctr", b"JUNKJUNKJUNK")?;

        assert_eq!(payload, EntryPayload::Opaque);
        assert!(logs_contain("unknown sub-format"));

        Ok(())
    }

    #[test]
    fn tag_failure_is_fatal() -> Result<()> {
        let chain = DecoderChain::default();
        let truncated = &container_bytes()?[..20];

        assert!(chain.decode("broken.bin", truncated).is_err());

        Ok(())
    }

    #[test]
    fn exhausted_chain() {
        let chain = DecoderChain::new(
            DecoderRegistry::default(),
            vec![Arc::new(TagStrategy), Arc::new(ExtensionStrategy)],
        );

        let result = chain.decode("a.bin", b"data");
        assert!(matches!(result, Err(Error::UnknownSubFormat { .. })));
    }

    #[test]
    fn extensions_ignore_case() {
        let chain = DecoderChain::default();

        assert!(chain.registry.by_extension("A.GcTr").is_some());
        assert!(chain.registry.by_extension("gctr").is_none());
        assert!(chain.registry.by_extension("a.bin").is_none());
    }

    #[traced_test]
    #[test]
    fn registered_extensions_are_tried() -> Result<()> {
        let mut chain = DecoderChain::default();
        chain
            .registry_mut()
            .register_extension("mesh", Tag::CONTAINER);

        assert_eq!(chain.decode("body.mesh", b"JUNKJUNK")?, EntryPayload::Opaque);
        assert!(logs_contain("body.mesh: unknown sub-format"));

        Ok(())
    }
}
