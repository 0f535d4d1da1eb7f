//! Property tests for view placement and the editing primitives.

use std::sync::Arc;

use mapregion::prelude::*;
use proptest::{prelude::*, sample::Index};

const REGION: u64 = 1024;

fn anonymous(max_size: u64) -> MappedRegion {
    let mut region = MappedRegion::with_platform(
        Config {
            encoding: Encoding::Latin1,
            max_size,
            auto_exit_guard: false,
            ..Config::default()
        },
        Arc::new(Native::new()),
        Arc::new(InstanceRegistry::new()),
    )
    .unwrap();
    region.open().unwrap();
    region
}

fn with_content(content: &str) -> MappedRegion {
    let mut region = anonymous(REGION);
    region.write_raw(content.as_bytes(), false).unwrap();
    region
}

fn contents(region: &mut MappedRegion) -> Vec<u8> {
    region.seek(0).unwrap();
    region.read_raw(region.max_size() as usize).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn views_are_page_aligned(pages in 1u64..6, offset in any::<Index>(), count in 1usize..20_000) {
        let g = Native::new().allocation_granularity();
        let max_size = pages * g;
        let offset = offset.index(max_size as usize) as u64;
        let mut region = anonymous(max_size);

        region.open_view(offset, Some(count), false).unwrap();
        prop_assert_eq!(region.view_start() % g, 0);
        prop_assert!(region.view_start() <= offset);
        prop_assert_eq!(region.tell(), offset);
        let end = (offset + count as u64).min(max_size);
        prop_assert!(region.view_start() + region.size() as u64 >= end);
        prop_assert!(region.view_start() + region.size() as u64 <= max_size);
    }

    #[test]
    fn cut_undoes_insert(content in "[a-z]{1,200}", insert in "[a-z]{1,50}", at in any::<Index>()) {
        let mut region = with_content(&content);
        let original = contents(&mut region);
        let at = at.index(content.len() + 1) as u64;

        region.seek(at).unwrap();
        prop_assert_eq!(region.insert_raw(insert.as_bytes(), false).unwrap(), insert.len());
        region.seek(at).unwrap();
        prop_assert_eq!(region.cut_raw(insert.len(), None).unwrap(), insert.as_bytes());

        prop_assert_eq!(contents(&mut region), original);
    }

    #[test]
    fn replace_splices(content in "[a-z]{1,200}", with in "[A-Z]{0,60}", at in any::<Index>(), span in any::<Index>()) {
        let mut region = with_content(&content);
        let at = at.index(content.len() + 1);
        let span = span.index(content.len() - at + 1);

        region.seek(at as u64).unwrap();
        let delta = region.replace_raw(with.as_bytes(), span, false, None).unwrap();
        prop_assert_eq!(delta, Some(with.len() as isize - span as isize));
        prop_assert_eq!(region.tell(), (at + with.len()) as u64);

        let expected = format!("{}{}{}", &content[..at], with, &content[at + span..]);
        let after = contents(&mut region);
        prop_assert_eq!(&after[..expected.len()], expected.as_bytes());
        prop_assert!(after[expected.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn text_round_trips(text in "[^\\x00]{1,300}") {
        let mut region = MappedRegion::with_platform(
            Config { max_size: 4096, auto_exit_guard: false, ..Config::default() },
            Arc::new(Native::new()),
            Arc::new(InstanceRegistry::new()),
        )
        .unwrap();
        region.open().unwrap();

        let units = region.write(&text, true, true).unwrap();
        prop_assert_eq!(units, text.encode_utf16().count());
        region.rewind().unwrap();
        prop_assert_eq!(region.read(None).unwrap(), (text, units));
    }
}
