use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tabstream::db::memory::MemoryDatabase;
use tabstream::db::{Connector, Execution, FieldDescriptor, Row, Session};
use tabstream::record::write_record;
use tabstream::streamer::stream_rows;
use tabstream::value::Value;
use tokio::runtime::Runtime;

const QUERY: &str = "SELECT id, name, note, score FROM items";

fn rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            vec![
                Value::SignedInt(i as i64),
                Value::Text(format!("item-{i}").into_bytes()),
                if i % 3 == 0 {
                    Value::Null
                } else {
                    Value::Text(format!("has, a comma and \"quotes\" {i}").into_bytes())
                },
                Value::Double(i as f64 * 0.5),
            ]
        })
        .collect()
}

fn database(count: usize) -> MemoryDatabase {
    MemoryDatabase::new()
        .with_type(8, "BIGINT")
        .with_type(253, "VARCHAR")
        .with_type(5, "DOUBLE")
        .with_result_set(
            QUERY,
            vec![
                FieldDescriptor::new("id", 8),
                FieldDescriptor::new("name", 253),
                FieldDescriptor::new("note", 253),
                FieldDescriptor::new("score", 5),
            ],
            rows(count),
        )
}

fn bench_write_record(c: &mut Criterion) {
    let fields = ["42", "plain", "needs, quoting", " leading space", "say \"hi\"", ""];
    let mut out = Vec::with_capacity(128);
    c.bench_function("write_record", |b| {
        b.iter(|| {
            out.clear();
            write_record(&mut out, std::hint::black_box(fields));
            std::hint::black_box(&out);
        })
    });
}

fn bench_stream_rows(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("stream_rows");

    for count in [100usize, 10_000] {
        let db = database(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("unbounded", count), &count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let mut session = db.connect().await.unwrap();
                    let Execution::Rows(mut cursor) =
                        session.execute(QUERY.as_bytes()).await.unwrap()
                    else {
                        panic!("expected rows");
                    };
                    std::hint::black_box(stream_rows(cursor.as_mut(), usize::MAX).await.unwrap());
                })
            })
        });
    }

    let db = database(10_000);
    group.bench_function("ceiling_64k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut session = db.connect().await.unwrap();
                let Execution::Rows(mut cursor) = session.execute(QUERY.as_bytes()).await.unwrap()
                else {
                    panic!("expected rows");
                };
                std::hint::black_box(stream_rows(cursor.as_mut(), 64 << 10).await.unwrap());
            })
        })
    });

    group.finish();
}

criterion_group!(benches, bench_write_record, bench_stream_rows);
criterion_main!(benches);
