#![no_main]

use libfuzzer_sys::fuzz_target;

use essl_validate::{validate_unit, Config, ShaderStage};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // The full parse + validate pipeline should never panic; hostile
        // input must terminate with a bounded diagnostic list.
        let parsed = essl_front::parse(source);
        let config = Config::default();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let mut unit = parsed.unit.clone();
            let _ = validate_unit(&mut unit, stage, &config);
        }
    }
});
