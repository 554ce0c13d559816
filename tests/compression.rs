#![cfg(all(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]

use anyhow::Result;
use std::io::{Read, Write};
use std::sync::Arc;
use tsvflow::io::compression::{
    CompressionCodec, Decoded, EncodedWrite, codec_for_path, create_encoded, open_decoded,
    register_codec,
};
use tsvflow::testing::{TsvFixture, sample_expression_table};
use tsvflow::*;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn read_all(path: &std::path::Path) -> Result<Vec<Record>> {
    Ok(TsvReader::open(path, ReaderOptions::default())?.dump()?)
}

#[test]
fn every_codec_yields_the_plain_records() -> Result<()> {
    init_logs();
    let fx = TsvFixture::new()?;
    let plain = read_all(&fx.write("expr.tsv", sample_expression_table())?)?;
    assert_eq!(plain.len(), 3);

    for name in ["expr.tsv.gz", "expr.tsv.zst", "expr.tsv.bz2", "expr.tsv.xz"] {
        let path = fx.write(name, sample_expression_table())?;
        assert_eq!(read_all(&path)?, plain, "{name}");
    }
    Ok(())
}

#[test]
fn rewind_works_for_every_codec() -> Result<()> {
    let fx = TsvFixture::new()?;
    for name in ["t.tsv.gz", "t.tsv.zst", "t.tsv.bz2", "t.tsv.xz"] {
        let path = fx.write(name, "# c\nk\tv\na\t1\nb\t2\n")?;
        let mut reader = TsvReader::open(&path, ReaderOptions::default())?;
        assert_eq!(reader.dump_column("k")?, ["a", "b"], "{name}");
        reader.rewind()?;
        assert_eq!(reader.dump_column("v")?, ["1", "2"], "{name}");
    }
    Ok(())
}

#[test]
fn gzip_detected_by_magic_bytes() -> Result<()> {
    let fx = TsvFixture::new()?;
    let gz = fx.write("counts.tsv.gz", "k\tv\na\t1\n")?;
    let disguised = fx.path("counts.txt");
    std::fs::rename(&gz, &disguised)?;

    match open_decoded(&disguised)? {
        Decoded::Codec { name, .. } => assert_eq!(name, "gzip"),
        Decoded::Plain(_) => panic!("expected gzip stream"),
    }
    let mut reader = TsvReader::open(&disguised, ReaderOptions::default())?;
    assert_eq!(reader.names(), ["k", "v"]);
    assert_eq!(reader.dump_column("v")?, ["1"]);
    Ok(())
}

#[test]
fn plain_file_stays_plain() -> Result<()> {
    let fx = TsvFixture::new()?;
    let path = fx.write("tiny.tsv", "x")?;
    assert!(matches!(open_decoded(&path)?, Decoded::Plain(_)));
    let path = fx.write("empty.tsv", "")?;
    assert!(matches!(open_decoded(&path)?, Decoded::Plain(_)));
    Ok(())
}

#[test]
fn appended_gzip_members_read_as_one_stream() -> Result<()> {
    let fx = TsvFixture::new()?;
    let path = fx.path("log.tsv.gz");

    let mut out = TsvWriter::create(&path, WriterOptions::default())?;
    out.set_names(["k", "v"]);
    out.write_header()?;
    out.write_row(["a", "1"])?;
    out.close()?;

    let mut out = TsvWriter::create(&path, WriterOptions::default().append(true))?;
    out.write_row(["b", "2"])?;
    out.close()?;

    let mut reader = TsvReader::open(&path, ReaderOptions::default())?;
    assert_eq!(reader.dump_column("k")?, ["a", "b"]);
    Ok(())
}

#[test]
fn suffix_match_is_case_insensitive() {
    assert_eq!(codec_for_path("A.TSV.GZ").map(|c| c.name().to_string()), Some("gzip".into()));
    assert!(codec_for_path("a.tsv").is_none());
}

struct Reversed;

impl CompressionCodec for Reversed {
    fn name(&self) -> &str {
        "reversed"
    }

    fn extensions(&self) -> &[&str] {
        &[".rev"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader_dyn(&self, mut reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        bytes.reverse();
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn EncodedWrite>> {
        Ok(Box::new(ReversingWriter { inner: writer, buf: Vec::new() }))
    }
}

struct ReversingWriter {
    inner: Box<dyn Write>,
    buf: Vec<u8>,
}

impl Write for ReversingWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl EncodedWrite for ReversingWriter {
    fn finish(mut self: Box<Self>) -> std::io::Result<()> {
        self.buf.reverse();
        self.inner.write_all(&self.buf)?;
        self.inner.flush()
    }
}

#[test]
fn registered_codec_is_used_by_suffix() -> Result<()> {
    register_codec(Arc::new(Reversed));
    let fx = TsvFixture::new()?;
    let path = fx.path("t.tsv.rev");

    let mut out = create_encoded(&path, false)?;
    out.write_all(b"k\tv\na\t1\n")?;
    out.finish()?;
    assert_eq!(std::fs::read(&path)?, b"\n1\ta\nv\tk".to_vec());

    let mut reader = TsvReader::open(&path, ReaderOptions::default())?;
    assert_eq!(reader.names(), ["k", "v"]);
    assert_eq!(reader.dump_column("v")?, ["1"]);
    reader.rewind()?;
    assert_eq!(reader.dump()?.len(), 1);
    Ok(())
}

/// Accepts data but cannot write its trailer.
struct Truncating;

impl CompressionCodec for Truncating {
    fn name(&self) -> &str {
        "truncating"
    }

    fn extensions(&self) -> &[&str] {
        &[".trunc"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(reader)
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn EncodedWrite>> {
        Ok(Box::new(TrailerFails(writer)))
    }
}

struct TrailerFails(Box<dyn Write>);

impl Write for TrailerFails {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl EncodedWrite for TrailerFails {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        Err(std::io::Error::other("disk full while writing trailer"))
    }
}

#[test]
fn close_reports_codec_finish_errors() -> Result<()> {
    register_codec(Arc::new(Truncating));
    let fx = TsvFixture::new()?;
    let mut out = TsvWriter::create(fx.path("t.tsv.trunc"), WriterOptions::default())?;
    out.write_row(["a", "1"])?;

    let err = out.close().unwrap_err();
    assert!(matches!(err, TsvError::Io { .. }));
    assert!(err.to_string().contains("disk full"));
    Ok(())
}

#[test]
fn closed_writer_output_is_complete_for_every_codec() -> Result<()> {
    let fx = TsvFixture::new()?;
    for name in ["w.tsv.gz", "w.tsv.zst", "w.tsv.bz2", "w.tsv.xz"] {
        let path = fx.path(name);
        let mut out = TsvWriter::create(&path, WriterOptions::default())?;
        out.set_names(["k", "v"]);
        out.write_header()?;
        out.write_row(["a", "1"])?;
        out.close()?;
        assert_eq!(fx.read(&path)?, "k\tv\na\t1\n", "{name}");
    }
    Ok(())
}
