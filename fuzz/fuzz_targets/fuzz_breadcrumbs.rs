#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let crumbs = loom::explorer::breadcrumbs_for(data);
    // The synthetic root always leads the trail.
    assert_eq!(crumbs[0].name, "Root");
    assert_eq!(crumbs[0].path, "");
    // Exactly the final appended entry may be marked last.
    let last_count = crumbs.iter().filter(|c| c.is_last).count();
    if crumbs.len() == 1 {
        assert_eq!(last_count, 0);
    } else {
        assert_eq!(last_count, 1);
        assert!(crumbs.last().is_some_and(|c| c.is_last));
    }
});
