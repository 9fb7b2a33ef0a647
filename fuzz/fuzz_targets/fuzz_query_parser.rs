#![no_main]

use libfuzzer_sys::fuzz_target;
use pevfind::config::ScanConfiguration;
use pevfind::query::{MapLoadLineResolver, parse_with_config};

fuzz_target!(|data: &str| {
    // Lexing and parsing must fail with an error, never panic. A
    // self-including loadline exercises the splice cap as well.
    let resolver = MapLoadLineResolver::new([("again", data), ("loop", "--loadline loop")]);
    if let Ok(parsed) = parse_with_config(data, &resolver, ScanConfiguration::with_base_dir("/")) {
        let mut tree = parsed.tree;
        tree.reorder_tree();
        let _ = tree.describe();
    }
});
