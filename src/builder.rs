use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};

use crate::block::{shared_prefix, DATA_MAGIC, MAX_RECORD};
use crate::config::Options;
use crate::error::Result;
use crate::index::Index;
use crate::reader::Reader;
use crate::search::SearchTree;
use crate::Error;

/// Streaming writer for a new database.
///
/// Records must arrive in strictly ascending byte order. Each block opens
/// with its first record stored in full; later records store only the suffix
/// that differs from their predecessor. When a record no longer fits, the
/// block is zero-padded to the block size and the next one opens. The
/// builder is consumed by [`Builder::finalize`], which freezes the index and
/// returns the read-side handle; any add error poisons the builder and all
/// further calls fail with [`Error::Finalized`].
pub struct Builder {
    out: BufWriter<File>,
    opts: Options,
    /// Bytes left in the open block; meaningless until the first record.
    room: usize,
    prev: Vec<u8>,
    firsts: Vec<Vec<u8>>,
    prefixes: Vec<u8>,
    tree: SearchTree,
    poisoned: bool,
}

impl Builder {
    /// Start a database at `opts.offset` in `file`, writing the magic and
    /// its header padding immediately.
    pub fn new(mut file: File, opts: Options) -> Result<Self> {
        opts.validate()?;
        file.seek(SeekFrom::Start(opts.offset))?;
        let mut out = BufWriter::new(file);
        out.write_all(DATA_MAGIC)?;
        write_zeros(&mut out, opts.block_size - DATA_MAGIC.len())?;
        Ok(Self {
            out,
            opts,
            room: 0,
            prev: Vec::with_capacity(MAX_RECORD),
            firsts: Vec::new(),
            prefixes: Vec::new(),
            tree: SearchTree::new(),
            poisoned: false,
        })
    }

    /// Append one record. Records must be 1..=255 bytes and strictly greater
    /// than the previous record.
    pub fn add(&mut self, record: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(Error::Finalized);
        }
        self.add_record(record).map_err(|err| {
            self.poisoned = true;
            err
        })
    }

    fn add_record(&mut self, record: &[u8]) -> Result<()> {
        if record.is_empty() || record.len() > MAX_RECORD {
            return Err(Error::BadSize(record.len()));
        }
        if self.firsts.is_empty() {
            return self.open_block(record);
        }
        if self.prev.as_slice() >= record {
            return Err(Error::OutOfOrder(format!(
                "record {:?} cannot follow {:?}",
                String::from_utf8_lossy(record),
                String::from_utf8_lossy(&self.prev)
            )));
        }

        let reuse = shared_prefix(&self.prev, record);
        let need = 2 + record.len() - reuse;
        if self.room < need {
            self.close_block()?;
            return self.open_block(record);
        }
        self.out
            .write_all(&[reuse as u8, (record.len() - reuse) as u8])?;
        self.out.write_all(&record[reuse..])?;
        self.room -= need;
        self.prev.clear();
        self.prev.extend_from_slice(record);
        Ok(())
    }

    /// Flush the final block, freeze the index, build the locator fill pass,
    /// and hand back the read-side handle.
    pub fn finalize(mut self) -> Result<Reader> {
        if self.poisoned {
            return Err(Error::Finalized);
        }
        self.close_block()?;
        let file = self
            .out
            .into_inner()
            .map_err(|err| Error::IO(err.to_string()))?;
        file.sync_all()?;

        let mut tree = self.tree;
        tree.fill();
        let index = Index::new(self.firsts, self.prefixes);
        log::debug!(
            "finalized wormdb: {} blocks of {} bytes",
            index.len(),
            self.opts.block_size
        );
        Reader::from_parts(file, self.opts, index, tree)
    }

    fn open_block(&mut self, record: &[u8]) -> Result<()> {
        self.out.write_all(&[record.len() as u8])?;
        self.out.write_all(record)?;
        self.room = self.opts.block_size - 1 - record.len();
        self.firsts.push(record.to_vec());
        self.prev.clear();
        self.prev.extend_from_slice(record);
        Ok(())
    }

    /// Pad the open block to the block size and record its index entry. The
    /// block prefix is the shared prefix of the block's first and last
    /// record, which for sorted records is the prefix shared by all of them.
    fn close_block(&mut self) -> Result<()> {
        let Some(first) = self.firsts.last() else {
            return Ok(());
        };
        let prefix = shared_prefix(first, &self.prev);
        self.tree.insert(first, prefix, self.prefixes.len() as u32 + 1);
        self.prefixes.push(prefix as u8);
        write_zeros(&mut self.out, self.room)?;
        self.room = 0;
        Ok(())
    }
}

fn write_zeros(out: &mut impl Write, mut n: usize) -> Result<()> {
    const ZEROS: [u8; 1024] = [0u8; 1024];
    while n > 0 {
        let chunk = n.min(ZEROS.len());
        out.write_all(&ZEROS[..chunk])?;
        n -= chunk;
    }
    Ok(())
}
