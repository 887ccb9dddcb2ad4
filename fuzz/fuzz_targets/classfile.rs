#![no_main]

use libfuzzer_sys::fuzz_target;
use weavescope::{weaver, ClassFile};

fuzz_target!(|data: &[u8]| {
    if let Ok(unit) = ClassFile::read(data) {
        let _ = unit.to_bytes();
        let _ = weaver::scan(&unit);
    }
});
