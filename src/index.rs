use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_32_ISCSI};
use serde::{Deserialize, Serialize};

use crate::block::INDEX_MAGIC;
use crate::error::Result;
use crate::search::SearchTree;
use crate::Error;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Per-block index: the full first record of each block plus the length of
/// the prefix shared by every record in that block. Entries are in block
/// order, which is also ascending first-record order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    firsts: Vec<Vec<u8>>,
    prefixes: Vec<u8>,
}

impl Index {
    pub(crate) fn new(firsts: Vec<Vec<u8>>, prefixes: Vec<u8>) -> Self {
        Self { firsts, prefixes }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.firsts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firsts.is_empty()
    }

    /// First record of the given block.
    pub fn first(&self, block: usize) -> &[u8] {
        &self.firsts[block]
    }

    /// Shared prefix length of the given block.
    pub fn prefix(&self, block: usize) -> usize {
        self.prefixes[block] as usize
    }

    pub(crate) fn firsts(&self) -> &[Vec<u8>] {
        &self.firsts
    }

    pub(crate) fn set_first(&mut self, block: usize, first: Vec<u8>) {
        self.firsts[block] = first;
    }
}

/// Payload of the index file, serialized as one bincode record framed with a
/// length prefix and a CRC32 of the payload bytes.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedIndex {
    pub block_size: u32,
    pub tree: SearchTree,
    pub prefixes: Vec<u8>,
    pub firsts: Vec<Vec<u8>>,
}

/// Borrowed twin of [`SavedIndex`]; bincode writes the two identically.
#[derive(Serialize)]
struct SavedIndexRef<'a> {
    block_size: u32,
    tree: &'a SearchTree,
    prefixes: &'a [u8],
    firsts: &'a [Vec<u8>],
}

pub(crate) fn save(
    mut out: impl Write,
    block_size: u32,
    tree: &SearchTree,
    index: &Index,
) -> Result<()> {
    out.write_all(INDEX_MAGIC)?;
    let payload = bincode::serialize(&SavedIndexRef {
        block_size,
        tree,
        prefixes: &index.prefixes,
        firsts: &index.firsts,
    })?;
    out.write_u32::<BigEndian>(payload.len() as u32)?;
    out.write_all(&payload)?;
    out.write_u32::<BigEndian>(CRC32.checksum(&payload))?;
    out.flush()?;
    Ok(())
}

pub(crate) fn load(mut input: impl Read) -> Result<SavedIndex> {
    let mut magic = [0u8; 6];
    input.read_exact(&mut magic)?;
    if &magic != INDEX_MAGIC {
        return Err(Error::BadMagic);
    }
    let len = input.read_u32::<BigEndian>()? as usize;
    let mut payload = vec![0u8; len];
    input.read_exact(&mut payload)?;
    let stored = input.read_u32::<BigEndian>()?;
    if stored != CRC32.checksum(&payload) {
        return Err(Error::Checksum);
    }
    Ok(bincode::deserialize(&payload)?)
}
