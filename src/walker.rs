use crate::block::{Cursor, MAX_RECORD};
use crate::error::Result;
use crate::reader::Reader;

/// In-order scan over every record of a database.
///
/// Call [`Walker::next`] to advance (including to the first record), then
/// [`Walker::bytes`] to look at it. The returned slice aliases the walker's
/// internal buffer and is overwritten by the following `next`; callers copy
/// the bytes they intend to retain.
pub struct Walker<'a> {
    reader: &'a Reader,
    /// Next block to load.
    block: usize,
    buf: Vec<u8>,
    pos: usize,
    rec: Vec<u8>,
    exhausted: bool,
    valid: bool,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Self {
            reader,
            block: 0,
            buf: vec![0u8; reader.block_size()],
            pos: 0,
            rec: Vec::with_capacity(MAX_RECORD),
            exhausted: true,
            valid: false,
        }
    }

    /// Advance to the next record. Returns false at the end of the database.
    pub fn next(&mut self) -> Result<bool> {
        loop {
            if self.exhausted {
                if self.block >= self.reader.index().len() {
                    self.valid = false;
                    return Ok(false);
                }
                self.reader.read_block(self.block, &mut self.buf)?;
                self.block += 1;
                self.pos = 0;
                self.exhausted = false;
            }
            let mut cursor = Cursor::resume(&self.buf, self.block - 1, self.pos);
            if cursor.advance(&mut self.rec)? {
                self.pos = cursor.pos();
                self.valid = true;
                return Ok(true);
            }
            self.exhausted = true;
        }
    }

    /// The current record, empty before the first `next` and after the end.
    pub fn bytes(&self) -> &[u8] {
        if self.valid {
            &self.rec
        } else {
            &[]
        }
    }

    /// The current record as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }
}
