use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::rc::Rc;
use tokenize_core::{
    InMemoryBuffer, LanguageIdCodec, LogErrorSink, ManualHost, TokenizationEngine,
    TokenizerRegistry,
};
use tokenize_grammar_simple::RuleBasedTokenizer;

fn large_source(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 48);
    for i in 0..line_count {
        match i % 7 {
            0 => out.push_str(&format!("fn item_{i}() {{\n")),
            1 => out.push_str(&format!("    let v = {i}; // counter\n")),
            2 => out.push_str("    /* spanning\n"),
            3 => out.push_str("       comment */\n"),
            4 => out.push_str(&format!("    let s = \"text {i}\";\n")),
            5 => out.push_str("    loop { break; }\n"),
            _ => out.push_str("}\n"),
        }
    }
    // Remove the final '\n' to avoid an extra trailing empty line.
    out.pop();
    out
}

struct Setup {
    buffer: Rc<InMemoryBuffer>,
    host: Rc<ManualHost>,
    engine: TokenizationEngine,
}

fn setup(text: &str) -> Setup {
    let codec = Rc::new(LanguageIdCodec::new());
    let buffer = Rc::new(InMemoryBuffer::new(text, "c"));
    let registry = Rc::new(TokenizerRegistry::new());
    registry.register(
        "c",
        Rc::new(RuleBasedTokenizer::c_like(&codec, "c").expect("grammar compiles")),
    );
    let host = Rc::new(ManualHost::new());
    let engine = TokenizationEngine::new(
        buffer.clone(),
        registry,
        codec,
        host.clone(),
        Rc::new(LogErrorSink),
    );
    Setup {
        buffer,
        host,
        engine,
    }
}

fn bench_cold_background_tokenization(c: &mut Criterion) {
    let text = large_source(50_000);
    c.bench_function("background_tokenize/50k_lines", |b| {
        b.iter_batched(
            || setup(&text),
            |s| {
                s.host.run_until_idle();
                black_box(s.engine.tokenized_line_count());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_source(50_000);
    c.bench_function("typing_middle/100_edits", |b| {
        b.iter_batched(
            || {
                let s = setup(&text);
                s.host.run_until_idle();
                s
            },
            |s| {
                // Repeatedly retype a mid-document line and let the
                // incremental pass catch up after each keystroke.
                for i in 0..100 {
                    s.buffer.set_line_text(25_000, &format!("    let v = {i};"));
                    s.host.run_until_idle();
                }
                black_box(s.engine.tokenized_line_count());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_force_tokenization_prefix(c: &mut Criterion) {
    let text = large_source(50_000);
    c.bench_function("force_tokenize/5k_lines", |b| {
        b.iter_batched(
            || setup(&text),
            |s| {
                s.engine.force_tokenization(5_000);
                black_box(s.engine.tokenized_line_count());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_cold_background_tokenization,
    bench_typing_in_middle,
    bench_force_tokenization_prefix
);
criterion_main!(benches);
