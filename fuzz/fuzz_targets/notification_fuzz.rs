#![no_main]

use libfuzzer_sys::fuzz_target;
use simcat::platform::callback::parse_statement_id;

fuzz_target!(|data: &[u8]| {
    // The listener reads the body as text before parsing it
    let body = String::from_utf8_lossy(data);
    if let Ok(id) = parse_statement_id(&body) {
        assert_eq!(body.trim().parse::<i64>().ok(), Some(id));
    }
});
