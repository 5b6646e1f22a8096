use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tinyserver::request::{find_header_end, Request};
use tinyserver::response::Response;

fn simple_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test\r\n\r\n";

    c.bench_function("simple_request_parse", |b| {
        b.iter(|| {
            let buffer = black_box(request.to_vec());
            let _ = Request::try_from(&buffer, 0).unwrap();
        });
    });
}

fn complex_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET /path/to/resource?id=123&name=test HTTP/1.1\r\n\
                    Host: localhost:7878\r\n\
                    User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
                    Accept: text/html,application/xhtml+xml\r\n\
                    Accept-Language: en-US,en;q=0.9\r\n\
                    Connection: keep-alive\r\n\
                    Upgrade-Insecure-Requests: 1\r\n\
                    \r\n";

    c.bench_function("complex_request_parse", |b| {
        b.iter(|| {
            let buffer = black_box(request.to_vec());
            let _ = Request::try_from(&buffer, 0).unwrap();
        });
    });
}

fn request_parse_post_body_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_post_body");

    for size in [0usize, 1024, 64 * 1024].iter() {
        let mut request = format!(
            "POST /data/log.json HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
            size
        )
        .into_bytes();
        request.extend(std::iter::repeat(b'x').take(*size));

        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| {
                let _ = Request::try_from(black_box(request), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn header_terminator_search_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_header_end");

    for size in [64usize, 4096, 100_000].iter() {
        let mut buffer = b"GET / HTTP/1.1\r\nX-Padding: ".to_vec();
        buffer.extend(std::iter::repeat(b'a').take(*size));
        buffer.extend_from_slice(b"\r\n\r\n");

        group.bench_with_input(BenchmarkId::from_parameter(size), &buffer, |b, buffer| {
            b.iter(|| find_header_end(black_box(buffer)));
        });
    }

    group.finish();
}

fn response_head_benchmark(c: &mut Criterion) {
    c.bench_function("response_404_head", |b| {
        b.iter(|| {
            let response = Response::response_404(black_box(0));
            black_box(response.as_bytes());
        });
    });

    c.bench_function("response_keep_alive_head", |b| {
        b.iter(|| {
            let mut response = Response::response_405(black_box(0));
            response.set_keep_alive(Some(10));
            black_box(response.head_bytes());
        });
    });
}

criterion_group!(
    benches,
    simple_request_parse_benchmark,
    complex_request_parse_benchmark,
    request_parse_post_body_benchmark,
    header_terminator_search_benchmark,
    response_head_benchmark
);
criterion_main!(benches);
