//! Integration tests for text editing on anonymous regions.
//!
//! These tests drive the text operations through the public API in each supported encoding,
//! including runs that cross page boundaries.

use std::sync::Arc;

use mapregion::prelude::*;
use regex::Regex;

fn anonymous(encoding: Encoding, max_size: u64) -> Result<MappedRegion> {
    let mut region = MappedRegion::with_platform(
        Config {
            encoding,
            max_size,
            ..Config::default()
        },
        Arc::new(Native::new()),
        Arc::new(InstanceRegistry::new()),
    )?;
    region.open()?;
    Ok(region)
}

fn sample(chars: usize) -> String {
    "The quick brown fox jumps over the lazy dog. "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

#[test]
fn utf16_text_across_pages() -> Result<()> {
    let sizer = anonymous(Encoding::Utf16Le, 0)?;
    let g = sizer.granularity();
    let mut region = anonymous(Encoding::Utf16Le, 2 * g)?;

    // Starts 50 bytes before the second page and ends well inside it
    let text = sample(g as usize / 2);
    region.seek(g - 50)?;
    assert_eq!(region.write(&text, false, true)?, text.len());

    region.seek(g - 50)?;
    let (read, units) = region.read(None)?;
    assert_eq!(read, text);
    assert_eq!(units, text.len());
    assert_eq!(region.tell(), g - 50 + 2 * text.len() as u64);
    Ok(())
}

#[test]
fn utf8_multibyte_units() -> Result<()> {
    let mut region = anonymous(Encoding::Utf8, 256)?;
    let text = "héllo wörld";

    assert_eq!(region.write(text, false, true)?, text.len());
    region.rewind()?;
    assert_eq!(region.read(None)?, (text.to_string(), 13));
    Ok(())
}

#[test]
fn latin1_single_byte_units() -> Result<()> {
    let mut region = anonymous(Encoding::Latin1, 64)?;

    assert_eq!(region.write("café", false, true)?, 4);
    region.rewind()?;
    region.read_raw(3)?;
    assert_eq!(region.read_raw(1)?, [0xE9]);

    region.rewind()?;
    assert_eq!(region.read(None)?.0, "café");
    Ok(())
}

#[test]
fn insert_then_cut_restores_text() -> Result<()> {
    let mut region = anonymous(Encoding::Utf16Le, 256)?;
    region.write("abcdef", false, true)?;

    region.seek(4)?;
    assert_eq!(region.insert("XYZ", false)?, 3);
    region.rewind()?;
    assert_eq!(region.read(None)?.0, "abXYZcdef");

    region.seek(4)?;
    assert_eq!(region.cut(Some(3), None, true)?, "XYZ");
    assert_eq!(region.tell(), 4);
    region.rewind()?;
    assert_eq!(region.read(None)?.0, "abcdef");
    Ok(())
}

#[test]
fn cut_stops_at_terminator() -> Result<()> {
    let mut region = anonymous(Encoding::Utf8, 64)?;
    region.write("first", false, true)?;
    region.seek(6)?;
    region.write("second", false, true)?;

    region.rewind()?;
    assert_eq!(region.cut(None, None, true)?, "first");

    // The terminator and the following entry moved to the cursor
    assert_eq!(region.read_raw(1)?, [0]);
    assert_eq!(region.read(None)?.0, "second");
    Ok(())
}

#[test]
fn replace_grows_region() -> Result<()> {
    let mut region = anonymous(Encoding::Utf8, 8)?;
    region.write("ab cd", false, true)?;

    region.seek(3)?;
    assert_eq!(region.replace("longer text", 2, false, None, true)?, None);
    assert_eq!(region.max_size(), 8);

    assert_eq!(region.replace("longer text", 2, true, None, true)?, Some(9));
    assert_eq!(region.max_size(), 16);
    region.rewind()?;
    assert_eq!(region.read(None)?.0, "ab longer text");
    Ok(())
}

#[test]
fn insert_terminated_keeps_following_entries() -> Result<()> {
    let mut region = anonymous(Encoding::Utf8, 32)?;
    region.write("one", false, true)?;
    region.seek(4)?;
    region.write("two", false, true)?;

    region.seek(0)?;
    assert_eq!(region.insert_terminated(">", false)?, Some(4));

    region.seek(0)?;
    assert_eq!(region.read(None)?.0, ">one");
    assert_eq!(region.read_raw(1)?, [0]);
    // Overwritten by the shifted terminator, the rest stays in place
    assert_eq!(region.read(None)?.0, "wo");
    Ok(())
}

#[test]
fn cut_pattern_spanning_page_boundary() -> Result<()> {
    let sizer = anonymous(Encoding::Utf8, 0)?;
    let g = sizer.granularity();
    let mut region = anonymous(Encoding::Utf8, 2 * g)?;

    let prefix = "x".repeat(g as usize - 3);
    region.write(&prefix, false, false)?;
    region.write("END-MARK;rest", false, true)?;

    region.rewind()?;
    let pattern = Regex::new("END-MARK;")?;
    let removed = region.cut_pattern(&pattern, true, None, true)?;
    assert_eq!(removed.len(), prefix.len() + "END-MARK;".len());
    assert!(removed.ends_with("END-MARK;"));

    assert_eq!(region.read(None)?.0, "rest");
    Ok(())
}

#[test]
fn byte_order_mark_is_skipped() -> Result<()> {
    let mut region = anonymous(Encoding::Utf16Le, 64)?;
    region.write_raw(Encoding::Utf16Le.bom(), false)?;
    region.write("marked", false, true)?;

    region.close_view()?;
    region.open_view(0, None, false)?;
    assert_eq!(region.start_byte(), 2);
    assert_eq!(region.tell(), 2);
    assert_eq!(region.read(None)?.0, "marked");

    region.seek(0)?;
    assert_eq!(detect_bom(&region.read_raw(4)?), Some((Encoding::Utf16Le, 2)));
    Ok(())
}
