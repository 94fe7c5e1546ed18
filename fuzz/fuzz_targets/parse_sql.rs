#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(tokens) = vertexdb::lexer::tokenize(data) {
        let _ = vertexdb::parser::parse(tokens);
    }
});
