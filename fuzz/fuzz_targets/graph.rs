#![no_main]
use libfuzzer_sys::fuzz_target;
use marksweep::testutil::test_graph;

fuzz_target!(|data: (u8, u16, u16, Vec<u8>)| {
    let (n, unroot_bits, collect_bits, edges) = data;
    test_graph(((n as usize) % 16) + 1, &edges, unroot_bits, collect_bits);
});
