#![no_main]

use dify_plugin_tools::fields::{
    first_present, first_string, INSTALLATION_ID_KEYS, INSTALLATION_LIST_KEYS,
    UNIQUE_IDENTIFIER_KEYS,
};
use dify_plugin_tools::installer::plugin_name;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Some(uid) = first_string(&value, UNIQUE_IDENTIFIER_KEYS) {
        let name = plugin_name(&uid);
        assert!(uid.starts_with(name));
        assert!(!name.contains(':'));
    }

    if let Some(list) = first_present(&value, INSTALLATION_LIST_KEYS).and_then(|v| v.as_array()) {
        for record in list {
            let _ = first_string(record, INSTALLATION_ID_KEYS);
        }
    }
});
