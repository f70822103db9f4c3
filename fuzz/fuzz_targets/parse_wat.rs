#![no_main]

use libfuzzer_sys::fuzz_target;

use watparse::wat::parse;

fuzz_target!(|data: &[u8]| {
    // Invalid UTF-8 becomes replacement chars
    let source = String::from_utf8_lossy(data);

    // Either a fatal error or a tree; never a panic or a stack overflow
    if let Ok(parse) = parse(&source) {
        if let Some(root) = &parse.root {
            for node in root.walk() {
                let span = node.span();
                assert!(span.start <= span.end && span.end <= source.len());
            }
        }
    }
});
