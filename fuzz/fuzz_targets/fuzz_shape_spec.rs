#![no_main]

use libfuzzer_sys::fuzz_target;
use npu_perf::TensorShapeInfo;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Operand and expression parsing should never panic on any input.
        if let Ok(info) = text.parse::<TensorShapeInfo>() {
            let _ = info.to_string();
            let _ = info.contiguous_suffix();
        }
        let _ = text.parse::<npu_perf_expr::Expr>();
    }
});
