use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ncollectd_core::config::parse_str;
use ncollectd_core::mdb::{Record, Store, StoreOptions};
use ncollectd_core::metric::LabelSet;
use ncollectd_core::mql::Point;
use ncollectd_core::xson::XsonValue;
use ncollectd_core::StrBuf;

const CONFIG: &str = r#"
Interval 10
plugin cpu {
    ReportByCpu true
    ValuesPercentage false
}
plugin df {
    MountPoint "/" "/home" "/var"
    FSType /^(ext4|xfs)$/
    ReportInodes true
}
"#;

const JSON: &str = r#"{"metrics":[{"name":"node_load1","labels":{"instance":"db1","job":"node"},
"points":[[1700000000000,0.42],[1700000010000,0.45],[1700000020000,0.51]]},
{"name":"node_load5","labels":{"instance":"db1","job":"node"},"points":[[1700000000000,0.3]]}]}"#;

fn labels() -> LabelSet {
    let mut labels = LabelSet::new();
    for (name, value) in [
        ("instance", "db1.example.net:9100"),
        ("job", "node"),
        ("cpu", "3"),
        ("mode", "idle"),
    ]
    .iter()
    {
        labels.add(name, value, true, false).unwrap();
    }
    labels
}

fn label_set(c: &mut Criterion) {
    c.bench_function("label_set_add", |b| b.iter(|| black_box(labels())));

    let set = labels();
    c.bench_function("label_set_marshal", |b| {
        let mut buf = StrBuf::new();
        b.iter(|| {
            buf.reset();
            set.marshal(&mut buf).unwrap();
            black_box(buf.len())
        })
    });

    let text = set.to_string();
    c.bench_function("label_set_unmarshal", |b| {
        b.iter(|| black_box(text.parse::<LabelSet>().unwrap()))
    });
}

fn config_parse(c: &mut Criterion) {
    c.bench_function("config_parse", |b| {
        b.iter(|| black_box(parse_str(CONFIG, None).unwrap()))
    });
}

fn xson_parse(c: &mut Criterion) {
    c.bench_function("xson_parse_tree", |b| {
        b.iter(|| black_box(XsonValue::parse(JSON).unwrap()))
    });

    let tree = XsonValue::parse(JSON).unwrap();
    c.bench_function("xson_render", |b| {
        b.iter(|| black_box(tree.to_json(false).unwrap()))
    });
}

fn mdb_store(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("bench"), StoreOptions::default()).unwrap();
    let points: Vec<Point> = (0..60)
        .map(|i| Point {
            timestamp: 1_700_000_000_000 + i * 10_000,
            value: i as f64,
        })
        .collect();
    let record = Record::new("node_cpu_seconds_total", labels(), points);

    c.bench_function("mdb_append", |b| {
        b.iter(|| black_box(store.append(&record).unwrap()))
    });

    let id = store.append(&record).unwrap();
    c.bench_function("mdb_read", |b| b.iter(|| black_box(store.read(id).unwrap())));
}

criterion_group!(benches, label_set, config_parse, xson_parse, mdb_store);
criterion_main!(benches);
