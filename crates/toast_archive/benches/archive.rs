use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    (0u32..0x40000)
        .map(|i| (i.wrapping_mul(2654435761) >> 27) as u8 ^ (i >> 9) as u8)
        .collect()
}

pub mod yaz0 {
    use divan::Bencher;
    use toast_archive::compression::yaz0;

    #[divan::bench(args = [0, 3, 6, 9])]
    fn compress(bencher: Bencher, level: u32) {
        bencher
            .with_inputs(super::get_input)
            .bench_refs(|data| divan::black_box(yaz0::compress(data, level)));
    }

    #[divan::bench]
    fn decompress(bencher: Bencher) {
        bencher
            .with_inputs(|| yaz0::compress(&super::get_input(), 6).unwrap())
            .bench_refs(|data| divan::black_box(yaz0::decompress(data).unwrap()));
    }
}

pub mod archive {
    use divan::Bencher;
    use toast_archive::{Container, Directory, File};

    fn tree() -> Directory {
        let mut root = Directory::default();
        let dot = root.directory_or_create(".");
        for i in 0..64 {
            dot.insert_file(File::new(format!("file_{i:02}.bin"), vec![i as u8; 0x300]));
        }
        root
    }

    #[divan::bench(args = [Container::U8, Container::Sarc])]
    fn write(bencher: Bencher, container: Container) {
        bencher
            .with_inputs(tree)
            .bench_refs(|root| divan::black_box(container.write(root).unwrap()));
    }

    #[divan::bench(args = [Container::U8, Container::Sarc])]
    fn read(bencher: Bencher, container: Container) {
        bencher
            .with_inputs(|| container.write(&tree()).unwrap())
            .bench_refs(|data| divan::black_box(container.read(data).unwrap()));
    }
}
