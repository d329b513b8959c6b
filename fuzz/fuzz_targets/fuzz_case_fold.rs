#![no_main]

use libfuzzer_sys::fuzz_target;
use npu_perf_expr::{Expr, PendingCases, Predicate, build_case};

fn value(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 4];
    buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
    i64::from(i32::from_le_bytes(buf))
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }
    let (selector, rest) = (data[0], &data[1..]);
    let (lhs, rhs) = (value(&rest[..4]), value(&rest[4..8]));
    let predicate = |l: Expr, r: Expr| match selector % 3 {
        0 => Predicate::less(l, r),
        1 => Predicate::equal(l, r),
        _ => Predicate::greater_equal(l, r),
    };

    // Constant predicates fold without a placeholder.
    let mut pending = PendingCases::new();
    let folded = build_case(predicate(lhs.into(), rhs.into()), Expr::from(1), Expr::from(2), &mut pending);
    assert!(pending.is_empty());
    assert!(folded.is_constant());

    // A symbolic predicate with distinct arms defers exactly once.
    let mut pending = PendingCases::new();
    let symbolic = Expr::symbol("n") * lhs + rhs;
    let deferred = build_case(predicate(symbolic, rhs.into()), Expr::from(1), Expr::from(2), &mut pending);
    if lhs != 0 {
        assert_eq!(pending.len(), 1);
        assert!(deferred.as_symbol().is_some_and(|s| s.is_placeholder()));
    }
});
