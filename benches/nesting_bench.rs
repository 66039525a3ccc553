use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use nestmode::config::{mode_handle, NestModeConfig, SubModeConfig};
use nestmode::line_stream::{LineStream, NullModeState};
use nestmode::mode::{Mode, ModeState, NoopResolver, Style};
use nestmode::nesting::NestingMode;
use nestmode::stream::Stream;

/// A stand-in "word" mode: consumes whatever is visible and reports a fixed
/// style, so the benchmark measures the nesting engine's own dispatch cost
/// rather than a real language lexer's.
struct WordMode(Option<Style>);

impl Mode for WordMode {
    fn start_state(&self) -> Box<dyn ModeState> {
        Box::new(NullModeState)
    }

    fn token(&self, stream: &mut dyn Stream, _state: &mut dyn ModeState) -> Option<Style> {
        let end = stream.string().len();
        stream.set_pos(end);
        self.0
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn build_mode() -> NestingMode {
    let script = mode_handle(Arc::new(WordMode(Some("js"))));
    let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None))))
        .with(SubModeConfig::new(r"<%", script).close(r"%>").delim_style("delim"));
    NestingMode::new(config.compile(&NoopResolver).unwrap())
}

fn tokenize_line(mode: &NestingMode, line: &str) {
    let mut stream = LineStream::new(line);
    let mut state = mode.start_state();
    while !stream.eol() {
        mode.token(&mut stream, state.as_mut());
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let mode = build_mode();
    let line = "a <% 1 + 2 %> b <% three %> c <% 4 %> trailing plain text after the last sub-mode region";

    c.bench_function("nesting tokenize_line", |b| {
        b.iter(|| {
            tokenize_line(std::hint::black_box(&mode), std::hint::black_box(line));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
