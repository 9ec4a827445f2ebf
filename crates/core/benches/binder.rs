use criterion::{Criterion, black_box, criterion_group, criterion_main};

use bytes::Bytes;
use gatehouse_core::{Method, ParamSpec, ParamType, RequestParts, bind};

fn query_binding(c: &mut Criterion) {
    let params = vec![
        ParamSpec::query("status", ParamType::Str).with_default(serde_json::Value::Null),
        ParamSpec::query("pageindex", ParamType::Int).with_default(0),
        ParamSpec::query("pagesize", ParamType::Int).with_default(10),
        ParamSpec::query("sortby", ParamType::Str).with_default("id"),
        ParamSpec::query("descending", ParamType::Int).with_default(0),
    ];
    let request = RequestParts {
        method: Method::Get,
        query: vec![
            ("status".into(), "active".into()),
            ("pageindex".into(), "3".into()),
            ("pagesize".into(), "25".into()),
        ],
        body: None,
    };

    c.bench_function("bind_paged_query", |b| {
        b.iter(|| bind(black_box(&params), black_box(&request)).unwrap())
    });
}

fn body_binding(c: &mut Criterion) {
    let params = vec![ParamSpec::body()];
    let request = RequestParts {
        method: Method::Post,
        query: Vec::new(),
        body: Some(Bytes::from_static(
            br#"{"name":"kira","age":41,"status_code":"active","remark":"benchmark row"}"#,
        )),
    };

    c.bench_function("bind_json_body", |b| {
        b.iter(|| bind(black_box(&params), black_box(&request)).unwrap())
    });
}

criterion_group!(benches, query_binding, body_binding);
criterion_main!(benches);
