use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use ucx_core::{parse, tokenize, LintContext, LintEngine, LibraryIndex, SymbolDatabase};
use lsp_types::{TextDocumentItem, Url};

/// Generate UnrealScript source of varying sizes for benchmarking
fn generate_source(size: usize) -> String {
    let mut source = String::from(
        "class BenchActor extends Actor\n    placeable;\n\nvar int Counter;\nvar string PlayerName;\n\n",
    );

    for i in 0..size {
        source.push_str(&format!(
            r#"
function int Compute{i}(int X, optional float Scale)
{{
    local int Result;

    Result = X * {} + Counter;
    if (Result > {} && Scale != 0.0)
    {{
        Result = Helper{i}(Result, "tag", bEnabled);
    }}
    else
    {{
        Log("Compute{i}" @ Result);
    }}
    return Result;
}}
"#,
            i + 1,
            i * 2,
        ));
    }

    source.push_str(
        r#"
event PostBeginPlay()
{
    local Pawn P;

    super.PostBeginPlay();
    foreach AllActors(class'Pawn', P)
    {
        P.Health = Max(P.Health, 100);
    }
}

defaultproperties
{
    Counter=0
}
"#,
    );

    source
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for size in [10, 50, 100, 500].iter() {
        let source = generate_source(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| black_box(tokenize(black_box(source))));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [10, 50, 100, 500].iter() {
        let source = generate_source(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| black_box(parse(black_box(source))));
        });
    }

    group.finish();
}

/// Benchmark parsing of malformed input
fn bench_parse_recovery(c: &mut Criterion) {
    let broken = generate_source(100)
        .replace(";\n    return", "\n    return")
        .replace("if (", "if ((");

    c.bench_function("parse_recovery", |b| {
        b.iter(|| black_box(parse(black_box(&broken))));
    });
}

fn bench_lint(c: &mut Criterion) {
    let mut group = c.benchmark_group("lint");
    let library = Arc::new(LibraryIndex::new());
    library.insert(
        parse("class Actor extends Object;\nnative function Log(string S);\nnative function int Max(int A, int B);\niterator function AllActors(class C, out Actor A);"),
        "Actor.uc".into(),
    );
    library.finish_loading();

    for size in [10, 100].iter() {
        let uri = Url::parse(&format!("file:///bench/BenchActor{size}.uc")).unwrap();
        let mut db = SymbolDatabase::new(Arc::clone(&library));
        db.workspace_mut().open_document(TextDocumentItem {
            uri: uri.clone(),
            language_id: "unrealscript".to_string(),
            version: 1,
            text: generate_source(*size),
        });
        let ast = db.get_ast(&uri).unwrap();
        let engine = LintEngine::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &ast, |b, ast| {
            let ctx = LintContext { db: &db, uri: &uri };
            b.iter(|| black_box(engine.lint(black_box(ast), &ctx)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_parse_recovery, bench_lint);
criterion_main!(benches);
