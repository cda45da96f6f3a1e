#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Treat each input line as one path key.
    let files: loom::message::FileCollection = data
        .lines()
        .map(|line| (line.to_string(), String::new()))
        .collect();
    let tree = loom::explorer::build_tree(&files);
    // Every leaf path must round-trip through the tree without panicking,
    // and no leaf may contain empty segments.
    for path in loom::explorer::leaf_paths(&tree) {
        assert!(!path.is_empty());
        assert!(path.split('/').all(|segment| !segment.is_empty()));
    }
});
