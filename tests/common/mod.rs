// Shared fixtures for testgap integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;

use testgap::coverage::FileFacts;
use testgap::{
    ExecutionFacts, LineRange, RunInput, SourceFile, TestUnit, UnitDescriptor, UnitId, UnitKind,
};

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn function(name: &str, file: &str, start: usize, end: usize) -> UnitDescriptor {
    UnitDescriptor::new(UnitKind::Function, name, file, LineRange::new(start, end))
}

pub fn method(name: &str, file: &str, start: usize, end: usize) -> UnitDescriptor {
    UnitDescriptor::new(UnitKind::Method, name, file, LineRange::new(start, end))
}

pub fn class(name: &str, file: &str, start: usize, end: usize) -> UnitDescriptor {
    UnitDescriptor::new(UnitKind::Class, name, file, LineRange::new(start, end))
}

pub fn unit_id(file: &str, qualified_name: &str) -> UnitId {
    UnitId::unit(Path::new(file), qualified_name)
}

pub fn module_id(file: &str) -> UnitId {
    UnitId::module(Path::new(file))
}

pub fn test_unit(name: &str, file: &str, source: &str) -> TestUnit {
    let lines = source.lines().count().max(1);
    TestUnit::new(name, file, LineRange::new(1, lines), source)
}

/// A small shop: billing functions, a cart class and an unmeasured util module.
pub fn shop_input() -> RunInput {
    let files = vec![
        SourceFile::new("src/billing.py", 30),
        SourceFile::new("src/cart.py", 40),
        SourceFile::new("src/util.py", 10),
    ];
    let units = vec![
        function("billing.calculate_total", "src/billing.py", 1, 10).with_complexity(5),
        function("billing.apply_discount", "src/billing.py", 12, 20).with_complexity(2),
        function("billing.refund", "src/billing.py", 22, 30).with_complexity(1),
        class("cart.Cart", "src/cart.py", 1, 40),
        method("cart.Cart.add", "src/cart.py", 3, 15).with_complexity(3),
        method("cart.Cart.remove", "src/cart.py", 17, 30).with_complexity(4),
        function("util.slugify", "src/util.py", 1, 10),
    ];

    let mut facts = ExecutionFacts::new();
    facts.insert(
        "src/billing.py",
        FileFacts::with_lines([2, 3, 4, 5, 6, 7, 8, 13, 14], [9, 10, 15, 16, 23, 24, 25]),
    );
    facts.insert(
        "src/cart.py",
        FileFacts::with_lines([1, 2, 4, 5, 6, 7], [8, 18, 19, 20, 21, 35]),
    );

    let tests = vec![
        test_unit(
            "test_calculate_total",
            "tests/test_billing.py",
            indoc::indoc! {"
                from billing import calculate_total

                def test_calculate_total():
                    assert calculate_total([1, 2]) == 3
            "},
        ),
        test_unit(
            "test_add",
            "tests/test_cart.py",
            indoc::indoc! {"
                from cart import Cart

                def test_add():
                    cart = Cart()
                    cart.add(1)
                    time.sleep(1)
                    assert len(cart) == 1
            "},
        ),
        test_unit(
            "test_mystery",
            "tests/test_other.py",
            "def test_mystery():\n    x = 1\n",
        ),
    ];

    RunInput::new(files, units)
        .with_tests(tests)
        .with_facts(facts)
}
