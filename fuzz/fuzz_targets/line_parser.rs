//! Fuzz target for the line parser.
//!
//! Feeds arbitrary input to the tokenizer and the full line parser; neither
//! may panic, whatever the bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Inbound lines are decoded lossily, so fuzz the same way.
    let input = String::from_utf8_lossy(data);
    if input.len() > 8191 {
        return;
    }

    let _ = slirc_tmi::line::Tokens::parse(&input);
    let _ = slirc_tmi::parse_line(&input);
    let _ = slirc_tmi::command::sanitize_text(&input);
});
