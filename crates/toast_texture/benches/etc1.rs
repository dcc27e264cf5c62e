use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    (0u32..256 * 256 * 4)
        .map(|i| (i.wrapping_mul(2654435761) >> 26) as u8 ^ (i >> 10) as u8)
        .collect()
}

pub mod etc1 {
    use divan::Bencher;
    use toast_texture::ctr::{self, CtrFormat};
    use toast_texture::etc1::build_pool;

    #[divan::bench(args = [1, 2, 4])]
    fn encode(bencher: Bencher, threads: usize) {
        let pool = build_pool(Some(threads)).unwrap();
        bencher
            .with_inputs(super::get_input)
            .bench_refs(|rgba| divan::black_box(ctr::encode(CtrFormat::Etc1a4, 256, 256, rgba, Some(&pool)).unwrap()));
    }

    #[divan::bench]
    fn decode(bencher: Bencher) {
        bencher
            .with_inputs(|| ctr::encode(CtrFormat::Etc1, 256, 256, &super::get_input(), None).unwrap())
            .bench_refs(|data| divan::black_box(ctr::decode(CtrFormat::Etc1, 256, 256, data).unwrap()));
    }
}

pub mod tpl {
    use divan::Bencher;
    use toast_texture::rvl::RvlFormat;
    use toast_texture::{Tpl, TplTexture};

    /// RGB5A3, RGBA32 and CMPR
    #[divan::bench(args = [0x05, 0x06, 0x0E])]
    fn write(bencher: Bencher, id: u32) {
        let format = RvlFormat::try_from(id).unwrap();
        bencher
            .with_inputs(|| Tpl {
                textures: vec![TplTexture::builder()
                    .width(256)
                    .height(256)
                    .format(format)
                    .rgba(super::get_input())
                    .build()],
            })
            .bench_refs(|tpl| divan::black_box(tpl.write().unwrap()));
    }
}
