use decvol_core::{CipherVariant, OperationParameters};
use decvol_crypto::{BlockCipherKey, CounterState, DecMode};

const SECTIONS: u64 = 4;
const SECTORS: u64 = 8;

fn make_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8).collect()
}

fn params(sector_len: u64) -> OperationParameters {
    OperationParameters::new(SECTIONS, SECTORS, 1, sector_len)
}

#[divan::bench(args = [64, 256, 512])]
fn bench_encrypt_wide(bencher: divan::Bencher, sector_len: u64) {
    let key = BlockCipherKey::generate(CipherVariant::Wide);
    let mode = DecMode::new(&key, &params(sector_len)).unwrap();
    let mut counters = CounterState::new(mode.geometry());
    let mut data = make_data(mode.geometry().volume_len());
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench_local(|| {
            mode.encrypt_in_place(divan::black_box(&mut data), &mut counters).unwrap();
        });
}

#[divan::bench(args = [64, 128, 256])]
fn bench_encrypt_narrow(bencher: divan::Bencher, sector_len: u64) {
    let key = BlockCipherKey::generate(CipherVariant::Narrow);
    let mode = DecMode::new(&key, &params(sector_len)).unwrap();
    let mut counters = CounterState::new(mode.geometry());
    let mut data = make_data(mode.geometry().volume_len());
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench_local(|| {
            mode.encrypt_in_place(divan::black_box(&mut data), &mut counters).unwrap();
        });
}

#[divan::bench(args = [64, 256, 512])]
fn bench_decrypt_wide(bencher: divan::Bencher, sector_len: u64) {
    let key = BlockCipherKey::generate(CipherVariant::Wide);
    let mode = DecMode::new(&key, &params(sector_len)).unwrap();
    let mut counters = CounterState::new(mode.geometry());
    let mut data = make_data(mode.geometry().volume_len());
    mode.encrypt_in_place(&mut data, &mut counters).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench_local(|| {
            mode.decrypt_in_place(divan::black_box(&mut data), &counters).unwrap();
        });
}

#[divan::bench(args = [64, 256, 512])]
fn bench_rotate_section_wide(bencher: divan::Bencher, sector_len: u64) {
    let key = BlockCipherKey::generate(CipherVariant::Wide);
    let mode = DecMode::new(&key, &params(sector_len)).unwrap();
    let mut counters = CounterState::new(mode.geometry());
    let mut data = make_data(mode.geometry().volume_len());
    mode.encrypt_in_place(&mut data, &mut counters).unwrap();
    let section_len = mode.geometry().section_range(0).len();
    bencher
        .counter(divan::counter::BytesCount::new(section_len))
        .bench_local(|| {
            mode.reencrypt_section_in_place(divan::black_box(&mut data), &mut counters, 0).unwrap();
        });
}

fn main() {
    divan::main();
}
