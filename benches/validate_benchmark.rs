/*!
 * Validation and Loading Benchmark
 * Cost of user pointer checks and executable loading
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use userprog_kernel::loader::Loader;
use userprog_kernel::memory::mmu;
use userprog_kernel::syscalls::validate::{copy_in, validate_c_string, validate_range};
use userprog_kernel::{AddressSpace, ImageBuilder, MemFs, PagePool, SegmentFlags};

const BASE: u32 = 0x0804_8000;
const PAGES: usize = 64;

fn populated_space(pool: &PagePool) -> AddressSpace {
    let mut space = AddressSpace::new(pool).unwrap();
    for page in 0..PAGES {
        let frame = pool.get_page().unwrap();
        space.map(BASE + (page * 4096) as u32, frame, true).unwrap();
    }
    space
}

fn benchmark_validate_range(c: &mut Criterion) {
    let pool = PagePool::new(PAGES + 1);
    let space = populated_space(&pool);
    let mut group = c.benchmark_group("validate_range");

    for len in [16u32, 4096, 65536, (PAGES * 4096) as u32].iter() {
        group.throughput(Throughput::Bytes(u64::from(*len)));
        group.bench_with_input(BenchmarkId::new("mapped", len), len, |b, &len| {
            b.iter(|| validate_range(black_box(&space), black_box(BASE), len).unwrap());
        });
    }

    group.finish();
}

fn benchmark_strings(c: &mut Criterion) {
    let pool = PagePool::new(PAGES + 1);
    let mut space = populated_space(&pool);
    let mut group = c.benchmark_group("c_string");

    for len in [8usize, 256, 4000].iter() {
        let mut text = vec![b'a'; *len];
        text.push(0);
        // Straddle a page boundary
        let addr = BASE + 4096 - (*len as u32 / 2);
        space.write(addr, &text).unwrap();

        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::new("validate", len), len, |b, _| {
            b.iter(|| black_box(validate_c_string(&space, black_box(addr)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("copy_in", len), len, |b, &len| {
            b.iter(|| black_box(copy_in(&space, black_box(addr), len as u32).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for pages in [1u32, 8, 32].iter() {
        let image = ImageBuilder::new(BASE)
            .segment(BASE, vec![0x90; 4096], SegmentFlags::READ | SegmentFlags::EXECUTE)
            .segment_with_memsz(
                0x0805_0000,
                vec![0x11; 512],
                pages * 4096,
                SegmentFlags::READ | SegmentFlags::WRITE,
            )
            .build();
        let fs = MemFs::new();
        fs.install("bench", &image).unwrap();
        let pool = PagePool::new(64);

        group.bench_with_input(BenchmarkId::new("segments", pages), pages, |b, _| {
            b.iter(|| {
                let mut slot = None;
                let loaded = Loader::new(&fs, &pool).load("bench", &mut slot).unwrap();
                mmu::activate_kernel();
                black_box((loaded, slot));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_validate_range,
    benchmark_strings,
    benchmark_load
);
criterion_main!(benches);
