#![no_main]

use libfuzzer_sys::fuzz_target;
use mapregion::{Config, Encoding, MappedRegion};

// Each 4-byte step is an opcode, an offset byte, a length byte and a payload byte
fuzz_target!(|data: &[u8]| {
    let Ok(mut region) = MappedRegion::new(Config {
        encoding: Encoding::Latin1,
        max_size: 512,
        auto_exit_guard: false,
        ..Config::default()
    }) else {
        return;
    };
    if region.open().is_err() {
        return;
    }

    for step in data.chunks_exact(4) {
        let offset = u64::from(step[1]) * 4 % (region.max_size() + 1);
        if region.seek(offset).is_err() {
            continue;
        }
        let len = usize::from(step[2]);
        let payload = vec![step[3]; len];
        let grow = step[0] & 0x80 != 0;

        let _ = match step[0] % 6 {
            0 => region.write_raw(&payload, grow).map(drop),
            1 => region.insert_raw(&payload, grow).map(drop),
            2 => region.cut_raw(len, None).map(drop),
            3 => region.replace_raw(&payload, len / 2, grow, None).map(drop),
            4 => region.read(Some(len)).map(drop),
            _ => region.read_raw(len).map(drop),
        };
        assert!(region.tell() <= region.max_size());
        if region.max_size() > 1 << 16 {
            break;
        }
    }
});
