use ledgerpost_engine::account::{AccountRecord, Page};
use ledgerpost_engine::split::split;

/// Page with a duplicate-id run every `dup_every` accounts.
fn synthetic_page(rows: usize, dup_every: usize) -> Page {
    let mut out = Vec::with_capacity(rows);
    let mut id = 0u64;
    while out.len() < rows {
        id += 1;
        let run = if id as usize % dup_every == 0 { 3 } else { 1 };
        for _ in 0..run.min(rows - out.len()) {
            out.push(AccountRecord {
                id,
                account_no: format!("SA-{id:06}"),
                currency_code: "USD".to_string(),
            });
        }
    }
    Page::from_rows(out).unwrap()
}

#[divan::bench(args = [4, 8, 16])]
fn split_page(bencher: divan::Bencher, workers: usize) {
    let page = synthetic_page(10_000, 7);
    bencher.bench(|| divan::black_box(split(divan::black_box(&page), workers)));
}

fn main() {
    divan::main();
}
