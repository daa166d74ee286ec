use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

// ---------------------------------------------------------------------------
// TFRecord container: a flat sequence of framed records, no header or index.
// ---------------------------------------------------------------------------
//
// Frame layout (all little endian):
//   [0..8]          length      u64
//   [8..12]         masked CRC32C of bytes [0..8]
//   [12..12+len]    data
//   [12+len..16+len] masked CRC32C of data
//
// masked(crc) = ((crc >> 15) | (crc << 17)) + 0xa282ead8  (wrapping)

const MASK_DELTA: u32 = 0xa282_ead8;
const CRC32C_POLY: u32 = 0x82f6_3b78;

const CRC32C_TABLE: [u32; 256] = build_crc32c_table();

const fn build_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ CRC32C_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32C (Castagnoli), as used by TFRecord and LevelDB.
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &b in data {
        crc = CRC32C_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    !crc
}

#[inline]
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Appends framed records to a byte stream.
///
/// The stream is owned by the writer; `finish` flushes it and hands it back,
/// dropping the writer without `finish` still closes the underlying file.
pub struct RecordWriter<W: Write> {
    out: W,
    bytes: u64,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a record file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create record file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, bytes: 0 }
    }

    /// Write one record. The frame is assembled in memory first so a
    /// record is handed to the stream in a single call.
    pub fn write_record(&mut self, data: &[u8]) -> Result<()> {
        let len = (data.len() as u64).to_le_bytes();
        let mut frame = Vec::with_capacity(data.len() + 16);
        frame.extend_from_slice(&len);
        frame.extend_from_slice(&masked_crc32c(&len).to_le_bytes());
        frame.extend_from_slice(data);
        frame.extend_from_slice(&masked_crc32c(data).to_le_bytes());

        self.out
            .write_all(&frame)
            .context("Failed to write record")?;
        self.bytes += frame.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush and return the underlying stream.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush().context("Failed to flush record stream")?;
        Ok(self.out)
    }
}

/// Reads framed records back, verifying both checksums of every frame.
pub struct RecordReader<R: Read> {
    input: R,
    index: u64,
    failed: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open record file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, index: 0, failed: false }
    }

    /// Next record's payload, `Ok(None)` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 12];
        match read_exact_or_eof(&mut self.input, &mut header)? {
            0 => return Ok(None),
            n if n < header.len() => bail!("record {}: truncated header ({} bytes)", self.index, n),
            _ => {}
        }

        let len_bytes = &header[0..8];
        let expected = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if masked_crc32c(len_bytes) != expected {
            bail!("record {}: length checksum mismatch", self.index);
        }
        let len = u64::from_le_bytes([
            header[0], header[1], header[2], header[3],
            header[4], header[5], header[6], header[7],
        ]);
        let len = usize::try_from(len)
            .map_err(|_| anyhow!("record {}: length {} does not fit in memory", self.index, len))?;

        let mut data = vec![0u8; len];
        self.input
            .read_exact(&mut data)
            .with_context(|| format!("record {}: truncated payload", self.index))?;
        let mut footer = [0u8; 4];
        self.input
            .read_exact(&mut footer)
            .with_context(|| format!("record {}: truncated checksum", self.index))?;
        if masked_crc32c(&data) != u32::from_le_bytes(footer) {
            bail!("record {}: data checksum mismatch", self.index);
        }

        self.index += 1;
        Ok(Some(data))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(Some(data)) => Some(Ok(data)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Like `read_exact`, but reports how many bytes were read when EOF comes first.
fn read_exact_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read record header"),
        }
    }
    Ok(filled)
}
