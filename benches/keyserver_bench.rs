//! Benchmarks for key server operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keyserver::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, KeyOps, KeyServerLocal,
    TlfCryptKeyServerHalf,
};

fn block_id(i: u32) -> BlockId {
    let mut raw = [0u8; 32];
    raw[..4].copy_from_slice(&i.to_be_bytes());
    BlockId::new(raw)
}

fn keyserver_benchmarks(c: &mut Criterion) {
    let store = KeyServerLocal::memory().unwrap();
    let half = BlockCryptKeyServerHalf::new([0xAB; 32]);

    let mut i = 0u32;
    c.bench_function("block_half_put", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            store
                .put_block_crypt_key_server_half(&block_id(i % 10_000), &half)
                .unwrap();
        })
    });

    for n in 0..10_000 {
        store.put_block_crypt_key_server_half(&block_id(n), &half).unwrap();
    }
    let mut i = 0u32;
    c.bench_function("block_half_get", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(
                store
                    .get_block_crypt_key_server_half(&block_id(i % 10_000))
                    .unwrap(),
            );
        })
    });

    let dir = DirId::new([1; 16]);
    let device = CryptPublicKey::new([2; 32]);
    let tlf_half = TlfCryptKeyServerHalf::new([3; 32]);
    for generation in 1..=64 {
        store
            .put_tlf_crypt_key_server_half(&dir, KeyGen(generation), &device, &tlf_half)
            .unwrap();
    }
    let mut generation = 0u32;
    c.bench_function("tlf_half_get", |b| {
        b.iter(|| {
            generation = generation % 64 + 1;
            black_box(
                store
                    .get_tlf_crypt_key_server_half(&dir, KeyGen(generation), &device)
                    .unwrap(),
            );
        })
    });
}

criterion_group!(benches, keyserver_benchmarks);
criterion_main!(benches);
