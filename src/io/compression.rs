//! Transparent compression for delimited sources and sinks.
//!
//! The codec for a path is chosen by its suffix when the stream is opened.
//! Readers additionally sniff magic bytes when the suffix is not recognized,
//! so a gzip file named `counts.txt` still decodes.
//!
//! ## Built-in codecs
//!
//! - **Gzip** (`.gz`, `.gzip`) via `flate2` (feature: `compression-gzip`).
//!   Multi-member streams are decoded in full, which keeps gzip output that
//!   was written in append mode readable.
//! - **Zstd** (`.zst`) via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) via `xz2` (feature: `compression-xz`)
//!
//! Additional codecs can be plugged in with [`register_codec`].
//!
//! ```no_run
//! use tsvflow::io::compression::{open_decoded, create_encoded, Decoded};
//! # fn main() -> anyhow::Result<()> {
//! let out = create_encoded("out/table.tsv.gz", false)?;
//! match open_decoded("in/table.tsv.gz")? {
//!     Decoded::Plain(_file) => {}
//!     Decoded::Codec { name, .. } => println!("decoding {name}"),
//! }
//! # drop(out);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Global codec registry.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

/// Built-in codecs enabled by cargo features.
fn builtin_codecs() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(builtin_codecs).clone()
}

/// Register an extra codec; it is consulted after the built-in ones.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(builtin_codecs).push(codec);
}

/// A compression format that can wrap byte streams.
///
/// Implementations live in a global registry and must be `Send + Sync`.
pub trait CompressionCodec: Send + Sync {
    /// Short codec name, used in log and error messages.
    fn name(&self) -> &str;

    /// Lowercase path suffixes including the leading dot.
    fn extensions(&self) -> &[&str];

    /// Leading bytes identifying the format, if it has any.
    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>>;

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodedWrite>>;
}

/// A sink that ends with an explicit finish step.
///
/// `finish` writes any codec trailer and flushes everything below it, so
/// errors surface to the caller instead of being lost on drop.
pub trait EncodedWrite: Write {
    fn finish(self: Box<Self>) -> io::Result<()>;
}

impl<W: Write> EncodedWrite for BufWriter<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.flush()
    }
}

/// Codec registered for the suffix of `path`, if any (case-insensitive).
pub fn codec_for_path(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let lower = path.as_ref().to_string_lossy().to_lowercase();
    registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| lower.ends_with(ext)))
}

fn codec_for_magic(head: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
    if head.is_empty() {
        return None;
    }
    registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| head.len() >= magic.len() && head.starts_with(magic))
    })
}

/// An opened source: either a plain seekable file or a decoding stream.
pub enum Decoded {
    Plain(File),
    Codec { name: String, reader: Box<dyn Read> },
}

/// Open `path` for reading, decoding it when its suffix or leading bytes name
/// a registered codec.
///
/// # Errors
/// Fails when the file cannot be opened or the codec cannot wrap it.
pub fn open_decoded(path: impl AsRef<Path>) -> Result<Decoded> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    let codec = match codec_for_path(path) {
        Some(codec) => Some(codec),
        None => {
            let mut head = [0u8; 16];
            let n = read_up_to(&mut file, &mut head)
                .with_context(|| format!("read leading bytes of {}", path.display()))?;
            file.seek(SeekFrom::Start(0))
                .with_context(|| format!("seek {}", path.display()))?;
            codec_for_magic(&head[..n])
        }
    };

    match codec {
        Some(codec) => {
            let reader = codec
                .wrap_reader_dyn(Box::new(file))
                .with_context(|| format!("wrap reader with {} codec", codec.name()))?;
            log::debug!("decoding {} as {}", path.display(), codec.name());
            Ok(Decoded::Codec {
                name: codec.name().to_string(),
                reader,
            })
        }
        None => Ok(Decoded::Plain(file)),
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Open `path` for writing, compressing by suffix. Parent directories are
/// created as needed. With `append`, output is added after existing content
/// (a compressed sink then gains a new stream member).
///
/// # Errors
/// Fails when directories or the file cannot be created or the codec cannot
/// wrap the stream.
pub fn create_encoded(path: impl AsRef<Path>, append: bool) -> Result<Box<dyn EncodedWrite>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("create {}", path.display()))?;
    auto_detect_writer(file, path)
}

/// Wrap `writer` with the codec matching `path_hint`, or a plain buffer.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn EncodedWrite>> {
    if let Some(codec) = codec_for_path(&path_hint) {
        return codec
            .wrap_writer_dyn(Box::new(BufWriter::new(writer)))
            .with_context(|| format!("wrap writer with {} codec", codec.name()));
    }
    Ok(Box::new(BufWriter::new(writer)))
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodedWrite>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-gzip")]
impl EncodedWrite for flate2::write::GzEncoder<Box<dyn Write>> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        flate2::write::GzEncoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodedWrite>> {
        let encoder = zstd::stream::write::Encoder::new(writer, 3)?;
        Ok(Box::new(ZstdSink(Some(encoder))))
    }
}

/// zstd encoders do not finish on drop by themselves.
#[cfg(feature = "compression-zstd")]
struct ZstdSink(Option<zstd::stream::write::Encoder<'static, Box<dyn Write>>>);

#[cfg(feature = "compression-zstd")]
impl ZstdSink {
    fn encoder(&mut self) -> io::Result<&mut zstd::stream::write::Encoder<'static, Box<dyn Write>>> {
        self.0
            .as_mut()
            .ok_or_else(|| io::Error::other("zstd stream already finished"))
    }
}

#[cfg(feature = "compression-zstd")]
impl Write for ZstdSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder()?.flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl EncodedWrite for ZstdSink {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        match self.0.take() {
            Some(encoder) => encoder.finish()?.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(feature = "compression-zstd")]
impl Drop for ZstdSink {
    fn drop(&mut self) {
        if let Some(encoder) = self.0.take()
            && let Err(e) = encoder.finish()
        {
            log::warn!("finishing zstd stream on drop failed: {e}");
        }
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use bzip2::read::MultiBzDecoder;
        Ok(Box::new(MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodedWrite>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-bzip2")]
impl EncodedWrite for bzip2::write::BzEncoder<Box<dyn Write>> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        bzip2::write::BzEncoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodedWrite>> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}

#[cfg(feature = "compression-xz")]
impl EncodedWrite for xz2::write::XzEncoder<Box<dyn Write>> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        xz2::write::XzEncoder::finish(*self)?.flush()
    }
}
