use std::sync::{Arc, Once};
use std::thread;

use pretty_assertions::assert_eq;
use progscan_core::{Deduplicator, Fingerprint, Offer, RawRecord};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn record(name: &str, url: &str) -> RawRecord {
    RawRecord {
        university_code: "HK001".to_string(),
        program_name: name.to_string(),
        detail_url: url.to_string(),
        apply_link: None,
        deadline: None,
        open_date: None,
        faculty: None,
    }
}

#[test]
fn first_offer_accepted_second_rejected() {
    init_logging();
    let dedup = Deduplicator::new();
    let rec = record("MSc Computer Science", "https://example.edu/msc-cs");

    assert_eq!(dedup.offer(&rec), Offer::Accepted);
    assert_eq!(dedup.offer(&rec), Offer::Duplicate);
    assert_eq!(dedup.accepted_len(), 1);
}

#[test]
fn whitespace_and_case_differences_collapse_to_one_fingerprint() {
    init_logging();
    let dedup = Deduplicator::new();
    let first = record("MSc  Computer Science", "https://example.edu/msc-cs  ");
    let second = record("msc computer science", "HTTPS://EXAMPLE.EDU/MSC-CS");

    assert_eq!(Fingerprint::of(&first), Fingerprint::of(&second));
    assert_eq!(dedup.offer(&first), Offer::Accepted);
    assert_eq!(dedup.offer(&second), Offer::Duplicate);
}

#[test]
fn distinct_urls_with_same_title_are_both_accepted() {
    init_logging();
    let dedup = Deduplicator::new();
    let a = record("MSc Finance", "https://example.edu/finance-2024");
    let b = record("MSc Finance", "https://example.edu/finance-2025");

    assert_eq!(dedup.offer(&a), Offer::Accepted);
    assert_eq!(dedup.offer(&b), Offer::Accepted);
    assert_eq!(dedup.accepted_len(), 2);
}

#[test]
fn offering_a_sequence_twice_accepts_the_same_set() {
    init_logging();
    let records = vec![
        record("MSc One", "https://example.edu/one"),
        record("MSc Two", "https://example.edu/two"),
        record("msc one", "https://example.edu/ONE"),
    ];

    let run = |dedup: &Deduplicator, passes: usize| {
        let mut accepted = Vec::new();
        for _ in 0..passes {
            for rec in &records {
                if dedup.offer(rec) == Offer::Accepted {
                    accepted.push(rec.detail_url.clone());
                }
            }
        }
        accepted
    };

    let once = Deduplicator::new();
    let twice = Deduplicator::new();
    assert_eq!(run(&once, 1), run(&twice, 2));
}

#[test]
fn concurrent_duplicate_offers_admit_exactly_one() {
    init_logging();
    let dedup = Arc::new(Deduplicator::new());
    let rec = record("MSc Data Science", "https://example.edu/msc-ds");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dedup = Arc::clone(&dedup);
            let rec = rec.clone();
            thread::spawn(move || dedup.offer(&rec))
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|h| h.join().expect("offer thread"))
        .filter(|offer| *offer == Offer::Accepted)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(dedup.accepted_len(), 1);
}
