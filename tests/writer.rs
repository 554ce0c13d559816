use anyhow::Result;
use tsvflow::testing::TsvFixture;
use tsvflow::*;

#[test]
fn unnamed_writer_round_trips_records() -> Result<()> {
    let fx = TsvFixture::new()?;
    let src = fx.write("in.tsv", "a\t1\nb\t2\n")?;
    let dst = fx.path("out.tsv");

    let mut reader = TsvReader::open(&src, ReaderOptions::default().no_header())?;
    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    while let Some(row) = reader.next_record()? {
        out.write_record(&row)?;
    }
    out.close()?;

    assert_eq!(fx.read(&dst)?, "a\t1\nb\t2\n");
    Ok(())
}

#[test]
fn declared_names_project_and_reorder() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv");
    let row = Record::with_names(vec!["g1".into(), "5".into(), "x".into()], ["id", "n", "note"])?;

    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.set_names(["n", "id"]);
    out.write_header()?;
    out.write_record(&row)?;
    out.close()?;

    assert_eq!(fx.read(&dst)?, "n\tid\n5\tg1\n");
    Ok(())
}

#[test]
fn missing_projected_name_writes_nothing() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv");
    let row = Record::with_names(vec!["g1".into()], ["id"])?;

    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.set_names(["id", "score"]);
    let err = out.write_record(&row).unwrap_err();
    assert!(matches!(err, TsvError::Lookup(ref n) if n == "score"));
    out.close()?;

    assert_eq!(fx.read(&dst)?, "");
    Ok(())
}

#[test]
fn header_without_names_is_a_no_op() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv");
    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.write_header()?;
    out.write_header_with(|names| format!("#{}", names.join(",")))?;
    out.write_row(["x", "y"])?;
    out.close()?;

    assert_eq!(fx.read(&dst)?, "x\ty\n");
    Ok(())
}

#[test]
fn custom_header_renderer() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.csv");
    let mut out = TsvWriter::create(&dst, WriterOptions::default().delimiter(","))?;
    out.set_names(["chrom", "start"]);
    out.write_header_with(|names| format!("#{}", names.join(",")))?;
    out.write_row(["chr1".to_string(), 100.to_string()])?;
    out.close()?;

    assert_eq!(fx.read(&dst)?, "#chrom,start\nchr1,100\n");
    Ok(())
}

#[test]
fn write_names_leaves_projection_untouched() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv");
    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.write_names(&["a", "b", "c"])?;
    assert!(out.names().is_empty());
    out.write_record(&Record::from(vec!["1", "2", "3"]))?;
    out.close()?;

    assert_eq!(fx.read(&dst)?, "a\tb\tc\n1\t2\t3\n");
    Ok(())
}

#[test]
fn append_mode_keeps_existing_content() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.write("log.tsv", "k\tv\na\t1\n")?;

    let mut out = TsvWriter::create(&dst, WriterOptions::default().append(true))?;
    out.write_row(["b", "2"])?;
    out.close()?;
    assert_eq!(fx.read(&dst)?, "k\tv\na\t1\nb\t2\n");

    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.write_row(["c", "3"])?;
    out.close()?;
    assert_eq!(fx.read(&dst)?, "c\t3\n");
    Ok(())
}

#[test]
fn append_mode_on_fresh_path() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("nested/dir/log.tsv");

    for v in ["1", "2"] {
        let mut out = TsvWriter::create(&dst, WriterOptions::default().append(true))?;
        out.write_row(["x", v])?;
        out.close()?;
    }
    assert_eq!(fx.read(&dst)?, "x\t1\nx\t2\n");
    Ok(())
}

#[test]
fn raw_text_is_written_verbatim() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv");
    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.write_raw("## generated\n")?;
    out.write_raw("partial")?;
    out.write_raw(" line\n")?;
    out.close()?;

    assert_eq!(fx.read(&dst)?, "## generated\npartial line\n");
    Ok(())
}

#[test]
fn compressed_output_reads_back() -> Result<()> {
    let fx = TsvFixture::new()?;
    let dst = fx.path("out.tsv.gz");
    let mut out = TsvWriter::create(&dst, WriterOptions::default())?;
    out.set_names(["id", "n"]);
    out.write_header()?;
    out.write_row(["g1", "3"])?;
    out.close()?;

    let mut reader = TsvReader::open(&dst, ReaderOptions::default())?;
    assert_eq!(reader.names(), ["id", "n"]);
    assert_eq!(reader.dump_column("n")?, ["3"]);
    Ok(())
}

#[test]
fn create_fails_on_directory() -> Result<()> {
    let fx = TsvFixture::new()?;
    let err = TsvWriter::create(fx.dir(), WriterOptions::default()).unwrap_err();
    assert!(matches!(err, TsvError::Io { .. }));
    Ok(())
}
