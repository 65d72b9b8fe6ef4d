use repo_lib::{ContentObject, ContentStore, Name, RepoResult};

pub const DEFAULT_CONTENT_TYPE: &str = "application/binary";

/// Writer-side role: the encoder hands over each emitted chunk as a
/// name suffix plus content, and the implementation decides where it
/// goes. One implementation per role, constructed and passed
/// explicitly.
pub trait PacketWriter {
    fn write_packet(
        &mut self,
        name_suffix: &str,
        content: &[u8],
        content_type: &str,
    ) -> RepoResult<Name>;
}

/// Stores each chunk as a ContentObject named `{prefix}/{suffix}`.
pub struct StorePacketWriter<'a> {
    store: &'a ContentStore,
    prefix: Name,
}

impl<'a> StorePacketWriter<'a> {
    pub fn new(store: &'a ContentStore, prefix: Name) -> Self {
        Self { store, prefix }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }
}

impl PacketWriter for StorePacketWriter<'_> {
    fn write_packet(
        &mut self,
        name_suffix: &str,
        content: &[u8],
        content_type: &str,
    ) -> RepoResult<Name> {
        let name = self.prefix.append_uri(name_suffix)?;
        let object = ContentObject::new(name, content.to_vec(), content_type);
        self.store.put(&object)
    }
}

/// One encoder-emitted chunk: a name suffix like "nontile/7" or
/// "tile/3/0/1" plus the chunk bytes.
#[derive(Debug, Clone)]
pub struct PacketChunk {
    pub suffix: String,
    pub content: Vec<u8>,
}

impl PacketChunk {
    pub fn new(suffix: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            suffix: suffix.into(),
            content,
        }
    }
}

/// Drain an encoder's chunk sequence into a writer. Returns the number
/// of chunks written.
pub fn publish<W: PacketWriter>(
    writer: &mut W,
    chunks: impl IntoIterator<Item = PacketChunk>,
) -> RepoResult<usize> {
    let mut written = 0;
    for chunk in chunks {
        writer.write_packet(&chunk.suffix, &chunk.content, DEFAULT_CONTENT_TYPE)?;
        written += 1;
    }
    Ok(written)
}
