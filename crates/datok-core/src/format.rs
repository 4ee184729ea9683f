//! Binary on-disk codec for the double-array and matrix tokenizers (§6.1).
//! Both formats are little-endian and gzip-framed; a loader peeks the first
//! five magic bytes (after decompression) to pick the decoder.

use std::io::{BufReader, Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::alphabet::Alphabet;
use crate::double_array::{DoubleArrayTokenizer, Entry};
use crate::error::{DatokError, Result};
use crate::matrix::MatrixTokenizer;
use crate::transducer::{read_char, TokenAutomaton};

const DA_MAGIC: &[u8; 5] = b"DATOK";
const MATRIX_MAGIC: &[u8; 5] = b"MATOK";
const VERSION: u16 = 1;

/// A loaded tokenizer of either runtime representation, as returned by
/// [`load_tokenizer`].
pub enum AnyTokenizer {
    DoubleArray(DoubleArrayTokenizer),
    Matrix(MatrixTokenizer),
}

impl TokenAutomaton for AnyTokenizer {
    fn alphabet(&self) -> &Alphabet {
        match self {
            AnyTokenizer::DoubleArray(t) => t.alphabet(),
            AnyTokenizer::Matrix(t) => t.alphabet(),
        }
    }

    fn step(&self, state: u32, symbol: u32) -> Option<crate::transducer::Step> {
        match self {
            AnyTokenizer::DoubleArray(t) => t.step(state, symbol),
            AnyTokenizer::Matrix(t) => t.step(state, symbol),
        }
    }

    fn resolve_separate(&self, state: u32) -> u32 {
        match self {
            AnyTokenizer::DoubleArray(t) => t.resolve_separate(state),
            AnyTokenizer::Matrix(t) => t.resolve_separate(state),
        }
    }
}

/// Peek the first five (decompressed) bytes to pick the decoder, then parse
/// the rest of the stream (§6.1: "A loader peeks the first 5 bytes").
pub fn load_tokenizer<R: Read>(r: R) -> Result<AnyTokenizer> {
    let mut bytes = Vec::new();
    GzDecoder::new(r).read_to_end(&mut bytes).map_err(DatokError::Io)?;

    if bytes.len() < 5 {
        return Err(DatokError::Format("file too short to contain a magic header".into()));
    }

    match &bytes[0..5] {
        m if m == DA_MAGIC => read_double_array(Cursor::new(bytes)).map(AnyTokenizer::DoubleArray),
        m if m == MATRIX_MAGIC => read_matrix(Cursor::new(bytes)).map(AnyTokenizer::Matrix),
        _ => Err(DatokError::Format("unrecognized magic header".into())),
    }
}

/// Write the double-array tokenizer in the `DATOK` format, gzip-compressed.
pub fn write_double_array<W: Write>(tok: &DoubleArrayTokenizer, w: W) -> Result<()> {
    let mut gz = GzEncoder::new(w, Compression::default());
    write_double_array_plain(tok, &mut gz)?;
    gz.finish().map_err(DatokError::Io)?;
    Ok(())
}

fn write_double_array_plain<W: Write>(tok: &DoubleArrayTokenizer, w: &mut W) -> Result<()> {
    let alphabet = tok.alphabet();

    w.write_all(DA_MAGIC).map_err(DatokError::Io)?;
    w.write_all(&VERSION.to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.epsilon as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.unknown as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.identity as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.final_symbol as u16).to_le_bytes()).map_err(DatokError::Io)?;

    let sigma = build_sigma_list(alphabet);
    w.write_all(&(alphabet.sigma_count as u16).to_le_bytes()).map_err(DatokError::Io)?;

    // Legacy field: doubled array length (§9 open question, preserved
    // verbatim for on-disk compatibility).
    w.write_all(&((tok.array().len() as u32) * 2).to_le_bytes())
        .map_err(DatokError::Io)?;

    write_sigma_runes(w, &sigma)?;
    w.write_all(b"T").map_err(DatokError::Io)?;

    for entry in tok.array() {
        w.write_all(&entry.base.to_le_bytes()).map_err(DatokError::Io)?;
        w.write_all(&entry.check.to_le_bytes()).map_err(DatokError::Io)?;
    }

    Ok(())
}

/// Read a gzip-compressed `DATOK` file.
pub fn read_double_array<R: Read>(r: R) -> Result<DoubleArrayTokenizer> {
    let gz = GzDecoder::new(r);
    read_double_array_plain(gz)
}

fn read_double_array_plain<R: Read>(r: R) -> Result<DoubleArrayTokenizer> {
    let mut reader = BufReader::new(r);

    let mut magic = [0u8; 5];
    reader.read_exact(&mut magic).map_err(|_| DatokError::Format("truncated header".into()))?;
    if &magic != DA_MAGIC {
        return Err(DatokError::Format("not a DATOK file".into()));
    }

    let mut head = [0u8; 16];
    reader
        .read_exact(&mut head)
        .map_err(|_| DatokError::Format("truncated header".into()))?;

    let version = u16::from_le_bytes([head[0], head[1]]);
    if version != VERSION {
        return Err(DatokError::Format(format!("unsupported version {version}")));
    }

    let epsilon = u16::from_le_bytes([head[2], head[3]]) as u32;
    let unknown = u16::from_le_bytes([head[4], head[5]]) as u32;
    let identity = u16::from_le_bytes([head[6], head[7]]) as u32;
    let final_symbol = u16::from_le_bytes([head[8], head[9]]) as u32;
    let sigma_count = u16::from_le_bytes([head[10], head[11]]) as usize;
    let array_len_doubled = u32::from_le_bytes([head[12], head[13], head[14], head[15]]);
    let array_len = (array_len_doubled / 2) as usize;

    let mut alphabet = Alphabet::new();
    alphabet.epsilon = epsilon;
    alphabet.unknown = unknown;
    alphabet.identity = identity;
    alphabet.final_symbol = final_symbol;
    alphabet.sigma_count = final_symbol;
    alphabet.prefill_identity();

    read_sigma_runes(&mut reader, sigma_count, &mut alphabet)?;

    let mut marker = [0u8; 1];
    reader
        .read_exact(&mut marker)
        .map_err(|_| DatokError::Format("truncated before marker".into()))?;
    if &marker != b"T" {
        return Err(DatokError::Format("missing 'T' marker".into()));
    }

    let mut array = Vec::with_capacity(array_len);
    let mut buf8 = [0u8; 8];
    for _ in 0..array_len {
        reader
            .read_exact(&mut buf8)
            .map_err(|_| DatokError::Format("truncated array data".into()))?;
        array.push(Entry {
            base: u32::from_le_bytes(buf8[0..4].try_into().unwrap()),
            check: u32::from_le_bytes(buf8[4..8].try_into().unwrap()),
        });
    }

    Ok(DoubleArrayTokenizer { alphabet, array })
}

/// Write the matrix tokenizer in the `MATOK` format, gzip-compressed.
pub fn write_matrix<W: Write>(tok: &MatrixTokenizer, w: W) -> Result<()> {
    let mut gz = GzEncoder::new(w, Compression::default());
    write_matrix_plain(tok, &mut gz)?;
    gz.finish().map_err(DatokError::Io)?;
    Ok(())
}

fn write_matrix_plain<W: Write>(tok: &MatrixTokenizer, w: &mut W) -> Result<()> {
    let alphabet = tok.alphabet();

    w.write_all(MATRIX_MAGIC).map_err(DatokError::Io)?;
    w.write_all(&VERSION.to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.epsilon as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.unknown as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&(alphabet.identity as u16).to_le_bytes()).map_err(DatokError::Io)?;
    w.write_all(&tok.state_count().to_le_bytes()).map_err(DatokError::Io)?;

    let sigma = build_sigma_list(alphabet);
    w.write_all(&(alphabet.sigma_count as u16).to_le_bytes()).map_err(DatokError::Io)?;
    write_sigma_runes(w, &sigma)?;
    w.write_all(b"M").map_err(DatokError::Io)?;

    for &v in tok.matrix() {
        w.write_all(&v.to_le_bytes()).map_err(DatokError::Io)?;
    }

    Ok(())
}

/// Read a gzip-compressed `MATOK` file.
pub fn read_matrix<R: Read>(r: R) -> Result<MatrixTokenizer> {
    let gz = GzDecoder::new(r);
    read_matrix_plain(gz)
}

fn read_matrix_plain<R: Read>(r: R) -> Result<MatrixTokenizer> {
    let mut reader = BufReader::new(r);

    let mut magic = [0u8; 5];
    reader.read_exact(&mut magic).map_err(|_| DatokError::Format("truncated header".into()))?;
    if &magic != MATRIX_MAGIC {
        return Err(DatokError::Format("not a MATOK file".into()));
    }

    let mut head = [0u8; 12];
    reader
        .read_exact(&mut head)
        .map_err(|_| DatokError::Format("truncated header".into()))?;

    let version = u16::from_le_bytes([head[0], head[1]]);
    if version != VERSION {
        return Err(DatokError::Format(format!("unsupported version {version}")));
    }

    let epsilon = u16::from_le_bytes([head[2], head[3]]) as u32;
    let unknown = u16::from_le_bytes([head[4], head[5]]) as u32;
    let identity = u16::from_le_bytes([head[6], head[7]]) as u32;
    let state_count = u32::from_le_bytes([head[8], head[9], head[10], head[11]]);

    let mut sigma_count_buf = [0u8; 2];
    reader
        .read_exact(&mut sigma_count_buf)
        .map_err(|_| DatokError::Format("truncated header".into()))?;
    let sigma_count = u16::from_le_bytes(sigma_count_buf) as usize;

    let mut alphabet = Alphabet::new();
    alphabet.epsilon = epsilon;
    alphabet.unknown = unknown;
    alphabet.identity = identity;
    alphabet.sigma_count = sigma_count as u32;
    alphabet.final_symbol = sigma_count as u32;
    alphabet.prefill_identity();

    read_sigma_runes(&mut reader, sigma_count, &mut alphabet)?;

    let mut marker = [0u8; 1];
    reader
        .read_exact(&mut marker)
        .map_err(|_| DatokError::Format("truncated before marker".into()))?;
    if &marker != b"M" {
        return Err(DatokError::Format("missing 'M' marker".into()));
    }

    let max_symbol = alphabet.sigma_count.saturating_sub(1).max(alphabet.epsilon);
    let total = max_symbol as usize * (state_count as usize + 1);

    let mut matrix = Vec::with_capacity(total);
    let mut buf4 = [0u8; 4];
    for _ in 0..total {
        reader
            .read_exact(&mut buf4)
            .map_err(|_| DatokError::Format("truncated matrix data".into()))?;
        matrix.push(u32::from_le_bytes(buf4));
    }

    Ok(MatrixTokenizer {
        alphabet,
        state_count,
        max_symbol,
        matrix,
    })
}

/// Build a dense rune list indexed by symbol, `0..=sigma_count`, with `'\0'`
/// standing in for indices that carry no literal rune (specials, gaps).
///
/// Sized to the full `sigma_count` (not just the highest symbol with a
/// literal rune): a special like `tokenend` can sit above every literal rune
/// in the numbering, and the matrix reader recomputes `max_symbol` from the
/// serialized `sigma_count` field, so undercounting here would silently
/// truncate the matrix payload on reload.
fn build_sigma_list(alphabet: &Alphabet) -> Vec<char> {
    let mut list = vec!['\0'; alphabet.sigma_count as usize + 1];
    for (rune, sym) in alphabet.rune_symbols() {
        list[sym as usize] = rune;
    }
    list
}

/// Writes one rune per symbol index `1..=sigma_count`, skipping index `0`
/// (`NO_SYMBOL`, never assigned): the header's `sigma_count` field counts
/// exactly these entries, so the written rune count must match it exactly.
fn write_sigma_runes<W: Write>(w: &mut W, sigma: &[char]) -> Result<()> {
    for &c in &sigma[1..] {
        let mut buf = [0u8; 4];
        w.write_all(c.encode_utf8(&mut buf).as_bytes()).map_err(DatokError::Io)?;
    }
    Ok(())
}

/// Reads `count` runes written by `write_sigma_runes` back onto symbol
/// indices `1..=count`.
fn read_sigma_runes<R: Read>(
    reader: &mut BufReader<R>,
    count: usize,
    alphabet: &mut Alphabet,
) -> Result<()> {
    for idx in 1..=count {
        match read_char(reader)? {
            Some(c) if c != '\0' => alphabet.insert_rune(idx as u32, c),
            Some(_) => {}
            None => return Err(DatokError::Format("truncated sigma section".into())),
        }
    }
    Ok(())
}
