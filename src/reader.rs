use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use crate::block::{Cursor, DATA_MAGIC, MAX_RECORD};
use crate::cache::Cache;
use crate::config::{Locator, Options};
use crate::error::Result;
use crate::index::{self, Index};
use crate::pool::BufferPool;
use crate::search::{binary_locate, Buckets, Lookup, SearchTree};
use crate::walker::Walker;
use crate::Error;

/// Read-side handle of a finalized database.
///
/// Lookups and walks take `&self` and are safe to share across threads: the
/// index and locator are immutable, block reads go through `pread`-style
/// positional IO, and the only mutable shared state is the buffer pool.
/// In-place updates take `&mut self`.
pub struct Reader {
    file: File,
    block_size: usize,
    /// File offset of data block 0 (one block past the magic header).
    base: u64,
    locator: Locator,
    index: Index,
    tree: SearchTree,
    buckets: Option<Buckets>,
    pool: BufferPool,
    cache: Option<Arc<dyn Cache>>,
}

/// Where a query resolves before any block IO.
enum Target {
    /// No block can hold a match.
    Missing,
    /// The indexed first record of this block is the answer.
    First(usize),
    /// Scan this block; on a miss the fallback block's first record (which
    /// starts with the query) is the answer.
    Scan {
        block: usize,
        fallback: Option<usize>,
    },
}

impl Reader {
    pub(crate) fn from_parts(
        file: File,
        opts: Options,
        index: Index,
        tree: SearchTree,
    ) -> Result<Reader> {
        let buckets = match opts.locator {
            Locator::BinarySearch => Some(Buckets::new(index.firsts())),
            Locator::Trie => None,
        };
        Ok(Self {
            file,
            block_size: opts.block_size,
            base: opts.offset + opts.block_size as u64,
            locator: opts.locator,
            index,
            tree,
            buckets,
            pool: BufferPool::new(opts.block_size),
            cache: opts.cache,
        })
    }

    /// Open a finalized database. The index is loaded out of band from
    /// `index_reader`; the block size recorded there takes precedence over
    /// `opts.block_size`.
    pub fn open(file: File, index_reader: impl Read, opts: Options) -> Result<Reader> {
        let mut magic = [0u8; 6];
        file.read_exact_at(&mut magic, opts.offset)?;
        if &magic != DATA_MAGIC {
            return Err(Error::BadMagic);
        }
        let saved = index::load(index_reader)?;
        let opts = Options {
            block_size: saved.block_size as usize,
            ..opts
        };
        opts.validate()?;
        let index = Index::new(saved.firsts, saved.prefixes);
        log::debug!(
            "loaded wormdb index: {} blocks of {} bytes",
            index.len(),
            opts.block_size
        );
        Self::from_parts(file, opts, index, saved.tree)
    }

    /// Open a database and its index from paths. The data file is opened
    /// read-write so in-place updates stay available.
    pub fn open_files(
        db: impl AsRef<Path>,
        idx: impl AsRef<Path>,
        opts: Options,
    ) -> Result<Reader> {
        let file = OpenOptions::new().read(true).write(true).open(db)?;
        let index_file = File::open(idx)?;
        Self::open(file, BufReader::new(index_file), opts)
    }

    /// Serialize the index and locator. Kept out of band from the data file;
    /// pair it with [`Reader::open`] to reload.
    pub fn save_index(&self, out: impl Write) -> Result<()> {
        index::save(out, self.block_size as u32, &self.tree, &self.index)?;
        log::debug!("saved wormdb index: {} blocks", self.index.len());
        Ok(())
    }

    /// Per-block index of first records and prefix lengths.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Find the first record that starts with `query`.
    ///
    /// Returns a freshly allocated copy, `Ok(None)` on a miss. A query
    /// shorter than the candidate block's shared prefix fails with
    /// [`Error::QueryTooShort`]. When a result cache is configured the whole
    /// lookup is memoized through it.
    pub fn find(&self, query: &[u8]) -> Result<Option<Vec<u8>>> {
        match &self.cache {
            Some(cache) => {
                let mut compute = || self.lookup(query);
                let (value, loaded) = cache.get_or_compute(query, &mut compute)?;
                if !loaded {
                    cache.stored(query);
                }
                Ok(value)
            }
            None => self.lookup(query),
        }
    }

    /// Iterate every record in insertion order.
    pub fn walker(&self) -> Walker<'_> {
        Walker::new(self)
    }

    /// Replace the record matching `query` with a same-length `replacement`.
    ///
    /// Returns `Ok(false)` when no record matches. When the target is a
    /// block's first record only the in-memory index changes and the caller
    /// is responsible for re-persisting it with [`Reader::save_index`];
    /// otherwise the containing block is rewritten in place. Replacements
    /// that would reorder the record relative to its neighbours fail with
    /// [`Error::OutOfOrder`].
    pub fn update(&mut self, query: &[u8], replacement: &[u8]) -> Result<bool> {
        match self.target(query)? {
            Target::Missing => Ok(false),
            Target::First(block) => self.update_first(block, replacement),
            Target::Scan { block, fallback } => {
                if self.update_in_block(block, query, replacement)? {
                    return Ok(true);
                }
                match fallback {
                    Some(block) => self.update_first(block, replacement),
                    None => Ok(false),
                }
            }
        }
    }

    fn lookup(&self, query: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.target(query)? {
            Target::Missing => Ok(None),
            Target::First(block) => Ok(Some(self.index.first(block).to_vec())),
            Target::Scan { block, fallback } => match self.scan(block, query)? {
                Some(rec) => Ok(Some(rec)),
                None => Ok(fallback.map(|block| self.index.first(block).to_vec())),
            },
        }
    }

    /// Resolve a query to a block without touching the data file.
    fn target(&self, query: &[u8]) -> Result<Target> {
        if query.is_empty() {
            return Err(Error::QueryTooShort);
        }
        if self.index.is_empty() {
            return Ok(Target::Missing);
        }

        let lookup = match self.locator {
            Locator::Trie => Lookup {
                pos: self.tree.locate(query).saturating_sub(1) as usize,
                exact: false,
            },
            Locator::BinarySearch => {
                match binary_locate(self.index.firsts(), self.buckets.as_ref(), query) {
                    Some(lookup) => lookup,
                    None => return Ok(Target::Missing),
                }
            }
        };
        if lookup.exact {
            return Ok(Target::First(lookup.pos));
        }

        // The locator can land one block past the smallest match when the
        // query is a proper prefix of a block's first record; step back while
        // the block before could still hold a match.
        let mut pos = lookup.pos;
        while pos > 0
            && extends(self.index.first(pos), query)
            && self.compatible(pos - 1, query)
        {
            pos -= 1;
        }

        if self.index.prefix(pos) > query.len() {
            return Err(Error::QueryTooShort);
        }

        let first = self.index.first(pos);
        let shared = first.len().min(query.len());
        match first[..shared].cmp(&query[..shared]) {
            Ordering::Greater => return Ok(Target::Missing),
            Ordering::Equal if first.len() >= query.len() => {
                return Ok(Target::First(pos));
            }
            _ => {}
        }

        // Advance while the next block still starts below the query. A next
        // first record that starts with the query ends the walk and becomes
        // the fallback answer for a scan miss.
        let mut fallback = None;
        while pos + 1 < self.index.len() {
            let next = self.index.first(pos + 1);
            let shared = next.len().min(query.len());
            match next[..shared].cmp(&query[..shared]) {
                Ordering::Less => pos += 1,
                Ordering::Equal if next.len() < query.len() => pos += 1,
                Ordering::Equal => {
                    fallback = Some(pos + 1);
                    break;
                }
                Ordering::Greater => break,
            }
        }

        // The block prefix must cover the query, otherwise no record of this
        // block can match.
        let prefix = self.index.prefix(pos);
        if prefix > 0 {
            let first = self.index.first(pos);
            let covered = prefix.min(query.len());
            if first[..covered] != query[..covered] {
                return Ok(match fallback {
                    Some(block) => Target::First(block),
                    None => Target::Missing,
                });
            }
        }
        Ok(Target::Scan { block: pos, fallback })
    }

    /// Whether a block could hold a record starting with `query`: the bytes
    /// all of its records are known to share must agree with the query.
    fn compatible(&self, block: usize, query: &[u8]) -> bool {
        let covered = self.index.prefix(block).min(query.len());
        self.index.first(block)[..covered] == query[..covered]
    }

    /// Scan one block for the first record starting with `query`.
    fn scan(&self, block: usize, query: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut buf = self.pool.get();
        self.read_block(block, &mut buf)?;

        let mut cursor = Cursor::new(&buf, block);
        let mut rec = Vec::with_capacity(MAX_RECORD);
        while cursor.advance(&mut rec)? {
            if rec.len() < query.len() {
                continue;
            }
            match rec[..query.len()].cmp(query) {
                Ordering::Equal => return Ok(Some(rec)),
                Ordering::Greater => return Ok(None),
                Ordering::Less => {}
            }
        }
        Ok(None)
    }

    fn update_first(&mut self, block: usize, replacement: &[u8]) -> Result<bool> {
        let first = self.index.first(block);
        if first.len() != replacement.len() {
            return Err(Error::LengthMismatch);
        }
        let prefix = self.index.prefix(block);
        if first[..prefix] != replacement[..prefix] {
            return Err(Error::OutOfOrder(format!(
                "replacement {:?} must keep the block prefix",
                String::from_utf8_lossy(replacement)
            )));
        }
        self.index.set_first(block, replacement.to_vec());
        Ok(true)
    }

    fn update_in_block(&mut self, block: usize, query: &[u8], replacement: &[u8]) -> Result<bool> {
        let mut buf = self.pool.get();
        self.read_block(block, &mut buf)?;

        let hit = {
            let mut cursor = Cursor::new(&buf, block);
            let mut rec = Vec::with_capacity(MAX_RECORD);
            let mut hit = None;
            while cursor.advance(&mut rec)? {
                if rec.len() < query.len() {
                    continue;
                }
                match rec[..query.len()].cmp(query) {
                    Ordering::Equal => {
                        hit = Some((cursor.reuse(), cursor.suffix(), cursor.next_reuse(), rec));
                        break;
                    }
                    Ordering::Greater => return Ok(false),
                    Ordering::Less => {}
                }
            }
            hit
        };
        let Some((reuse, suffix, next_reuse, original)) = hit else {
            return Ok(false);
        };

        if original.len() != replacement.len() {
            return Err(Error::LengthMismatch);
        }
        // Bytes reused by this record, or reused from it by its successor,
        // live in neighbouring entries; changing them would reorder the
        // chain.
        let shared = reuse.max(next_reuse.unwrap_or(0));
        if original[..shared] != replacement[..shared] {
            return Err(Error::OutOfOrder(format!(
                "replacement {:?} must keep the {} bytes shared with its neighbours",
                String::from_utf8_lossy(replacement),
                shared
            )));
        }

        buf[suffix].copy_from_slice(&replacement[reuse..]);
        let offset = self.base + block as u64 * self.block_size as u64;
        self.file.write_all_at(&buf, offset)?;
        Ok(true)
    }

    pub(crate) fn read_block(&self, block: usize, buf: &mut [u8]) -> Result<()> {
        let offset = self.base + block as u64 * self.block_size as u64;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

fn extends(first: &[u8], query: &[u8]) -> bool {
    first.len() > query.len() && &first[..query.len()] == query
}
