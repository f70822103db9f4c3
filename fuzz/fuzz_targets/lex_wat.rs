#![no_main]

use libfuzzer_sys::fuzz_target;

use watparse::wat::Lexer;

fuzz_target!(|data: &[u8]| {
    // Invalid UTF-8 becomes replacement chars
    let source = String::from_utf8_lossy(data);

    // Token spans stay in bounds and in order, including after errors
    let mut last_end = 0;
    for result in Lexer::new(&source).with_comments() {
        match result {
            Ok(token) => {
                assert!(token.span.start >= last_end && token.span.end <= source.len());
                last_end = token.span.end;
            }
            Err(e) => assert!(e.span.end <= source.len()),
        }
    }
});
