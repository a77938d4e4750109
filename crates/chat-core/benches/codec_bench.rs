//! Criterion benchmarks for the newline-delimited JSON codec.
//!
//! Every relayed chat message and every heartbeat probe passes through
//! `encode_frame` once, and every inbound frame through `FrameBuffer` plus
//! `decode_frame`, so these are the hot paths of the broker.
//!
//! Run with:
//! ```bash
//! cargo bench --package chat-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chat_core::protocol::FrameBuffer;
use chat_core::{
    decode_frame, encode_frame, ChatRelay, ClientFrame, OnlineUsers, ServerFrame, SessionId,
    SystemNotice, DEFAULT_MAX_FRAME_LEN,
};

// ── Frame fixtures ────────────────────────────────────────────────────────────

fn make_relay() -> ServerFrame {
    ServerFrame::from(ChatRelay {
        sender_id: SessionId::new(17),
        sender_nickname: "alice".to_string(),
        message: "hello there, how is the weather on your side?".to_string(),
    })
}

fn make_online(users: u64) -> ServerFrame {
    let map: OnlineUsers = (1..=users)
        .map(|id| (SessionId::new(id), format!("user-{id}")))
        .collect();
    ServerFrame::from(SystemNotice::online(map))
}

fn make_chat_line() -> Vec<u8> {
    encode_frame(&ClientFrame::Chat {
        sender_id: None,
        receiver_id: SessionId::new(42),
        message: "ping".repeat(16),
    })
    .unwrap()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let relay = make_relay();
    let probe = ServerFrame::from(SystemNotice::connection_check());

    c.bench_function("encode_relay", |b| b.iter(|| encode_frame(black_box(&relay))));
    c.bench_function("encode_connection_check", |b| {
        b.iter(|| encode_frame(black_box(&probe)))
    });

    let mut group = c.benchmark_group("encode_online");
    for users in [1u64, 100, 1000] {
        let frame = make_online(users);
        group.bench_with_input(BenchmarkId::from_parameter(users), &frame, |b, f| {
            b.iter(|| encode_frame(black_box(f)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let line = make_chat_line();

    c.bench_function("decode_chat", |b| {
        b.iter(|| decode_frame::<ClientFrame>(black_box(&line)))
    });

    // 64 frames arriving in one read, split and decoded one by one.
    let burst: Vec<u8> = line.iter().copied().cycle().take(line.len() * 64).collect();
    c.bench_function("frame_buffer_burst_64", |b| {
        b.iter(|| {
            let mut buf = FrameBuffer::new(DEFAULT_MAX_FRAME_LEN);
            buf.extend(black_box(&burst));
            let mut n = 0;
            while let Ok(Some(l)) = buf.next_line() {
                let _ = decode_frame::<ClientFrame>(&l);
                n += 1;
            }
            n
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
