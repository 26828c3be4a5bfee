#![no_main]

use dify_plugin_tools::credentials::PartialCredentials;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(partial) = serde_json::from_slice::<PartialCredentials>(data) else {
        return;
    };

    let complete = partial.is_complete();
    let missing = partial.missing_field();
    assert_eq!(complete, missing.is_none());
    assert_eq!(partial.complete().is_some(), complete);
});
