// tests/dedup_properties.rs
use rand::{rngs::StdRng, Rng, SeedableRng};
use vinyl_watch::{dedupe, dedupe_by_identity, CandidateItem};

fn item(id: &str, title: &str, price: &str, source: &str) -> CandidateItem {
    CandidateItem::new(id, title, source).with_price(price)
}

fn random_batch(rng: &mut StdRng, n: usize) -> Vec<CandidateItem> {
    let titles = ["Kino LP", "kino lp", "Aria", "Signs of Life", "", "OST 2LP"];
    let prices = ["100", "£25.00", "£25.00 £25.00", "1 990 руб.", "", "2500 → 1990"];
    let suffixes = ["", "/", "?utm=1", "#top", "/?a=b"];
    (0..n)
        .map(|_| {
            let id = format!(
                "https://s.test/p/{}{}",
                rng.random_range(0..8),
                suffixes[rng.random_range(0..suffixes.len())]
            );
            item(
                &id,
                titles[rng.random_range(0..titles.len())],
                prices[rng.random_range(0..prices.len())],
                ["a", "b", "c"][rng.random_range(0..3)],
            )
        })
        .collect()
}

#[test]
fn dedup_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let n = rng.random_range(0..30);
        let (once, _) = dedupe(random_batch(&mut rng, n));
        let (twice, report) = dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(report.total(), 0);
    }
}

#[test]
fn unique_input_is_preserved_in_order() {
    let input = vec![
        item("https://s.test/3", "Three", "30", "a"),
        item("https://s.test/1", "One", "10", "b"),
        item("https://s.test/2", "Two", "", "a"),
        item("https://s.test/4", "", "40", "c"),
    ];
    let (out, report) = dedupe(input.clone());
    assert_eq!(out, input);
    assert_eq!(report.total(), 0);
}

#[test]
fn identity_collapse() {
    let (out, report) = dedupe(vec![item("a/?x=1", "x", "", "s"), item("a/", "y", "", "s")]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "a");
    assert_eq!(out[0].title, "x");
    assert_eq!(report.identity_dupes, 1);
}

#[test]
fn content_collapse_across_sources() {
    let (out, report) = dedupe(vec![
        item("https://one.test/1", "Foo", "100", "one"),
        item("https://two.test/9", "foo", "100", "two"),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source, "one");
    assert_eq!(report.content_dupes, 1);
}

#[test]
fn duplicated_price_rendering_still_collapses() {
    let (out, _) = dedupe(vec![
        item("https://one.test/1", "OST 2LP", "£34.99", "one"),
        item("https://two.test/2", "OST 2LP", "£34.99 £34.99", "two"),
        item("https://three.test/3", "OST 2LP", "34,99 EUR", "three"),
    ]);
    assert_eq!(out.len(), 1);
}

#[test]
fn blank_title_and_price_never_collide() {
    let (out, report) = dedupe(vec![
        item("https://s.test/1", "", "", "a"),
        item("https://s.test/2", "  ", "", "a"),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!(report.total(), 0);
}

#[test]
fn identity_pass_rewrites_ids_and_counts_drops() {
    let (out, dropped) = dedupe_by_identity(vec![
        item("https://s.test/p/1/", "A", "", "a"),
        item("https://s.test/p/1?ref=x", "A again", "", "a"),
        item("   ", "no identity", "", "a"),
    ]);
    assert_eq!(dropped, 2);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "https://s.test/p/1");
}
