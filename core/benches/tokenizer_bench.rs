use criterion::{criterion_group, criterion_main, Criterion};
use search_core::tokenizer::tokenize;

const LINE: &str = "The quick, brown fox -- jumped over 12 lazy dogs! Didn't it? \
                    Tabs\tand punctuation (everywhere) are stripped before splitting.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_line", |b| b.iter(|| tokenize(LINE)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
