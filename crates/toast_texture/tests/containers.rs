use pretty_assertions::assert_eq;
use toast_texture::{
    ctr, error::Error, rvl, Ctpk, CtpkTexture, CtpkWriteOptions, CtrFormat, RvlFormat, Tpl,
    TplTexture,
};
use tracing::info;
use tracing_test::traced_test;

fn gradient(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| {
            (0..width).flat_map(move |x| {
                [
                    (x * 255 / width.max(2)) as u8,
                    (y * 255 / height.max(2)) as u8,
                    0x80,
                    if (x + y) % 3 == 0 { 0xFF } else { 0x60 },
                ]
            })
        })
        .collect()
}

/// Formats whose encoder is idempotent on its own output
const RVL_FORMATS: [RvlFormat; 7] = [
    RvlFormat::I4,
    RvlFormat::I8,
    RvlFormat::Ia4,
    RvlFormat::Ia8,
    RvlFormat::Rgb565,
    RvlFormat::Rgb5a3,
    RvlFormat::Rgba32,
];

#[traced_test]
#[test]
fn tpl_round_trip_for_every_direct_format() -> Result<(), Error> {
    let textures = RVL_FORMATS
        .iter()
        .map(|&format| {
            TplTexture::builder()
                .width(20)
                .height(12)
                .format(format)
                .rgba(gradient(20, 12))
                .build()
        })
        .collect();
    let tpl = Tpl { textures };

    let first = tpl.write()?;
    let read = Tpl::read(&first)?;
    for (texture, format) in read.textures.iter().zip(RVL_FORMATS) {
        info!("checking {format:?}");
        assert_eq!(texture.format, format);
        assert_eq!((texture.width, texture.height), (20, 12));

        let encoded = rvl::encode(format, 20, 12, &texture.rgba, None)?;
        let direct = rvl::encode(format, 20, 12, &gradient(20, 12), None)?;
        assert_eq!(encoded.data, direct.data);
    }

    assert_eq!(read.write()?, first);
    Ok(())
}

#[test]
fn tpl_indexed_capacity() -> Result<(), Error> {
    let colors = |count: u32| -> Vec<u8> {
        (0..16 * 16)
            .flat_map(|i| [(i % count) as u8, (i % count >> 8) as u8, 0, 0xFF])
            .collect()
    };

    let fits = Tpl {
        textures: vec![TplTexture::builder()
            .width(16)
            .height(16)
            .format(RvlFormat::C8)
            .rgba(colors(256))
            .build()],
    };
    let data = fits.write()?;
    assert_eq!(Tpl::read(&data)?.textures[0].palette.as_ref().map(Vec::len), Some(256));

    let overflow = Tpl {
        textures: vec![TplTexture::builder()
            .width(16)
            .height(17)
            .format(RvlFormat::C8)
            .rgba({
                let mut rgba = colors(256);
                rgba.extend([0xFF, 0xFF, 0xFF, 0xFF].repeat(16));
                rgba
            })
            .build()],
    };
    assert!(matches!(
        overflow.write(),
        Err(Error::PaletteOverflow {
            colors: 257,
            capacity: 256,
            ..
        })
    ));
    Ok(())
}

#[traced_test]
#[test]
fn ctpk_round_trip_for_every_format() -> Result<(), Error> {
    let mut ctpk = Ctpk {
        textures: CtrFormat::ALL
            .iter()
            .map(|&format| {
                CtpkTexture::new(
                    format!("{format:?}.tga").to_lowercase(),
                    format,
                    24,
                    16,
                    gradient(24, 16),
                )
            })
            .collect::<Result<_, _>>()?,
    };

    let (first, report) = ctpk.write(&CtpkWriteOptions::builder().threads(3).build())?;
    assert!(report.downscaled.is_empty());

    let read = Ctpk::read(&first)?;
    for (texture, format) in read.textures.iter().zip(CtrFormat::ALL) {
        info!("checking {format:?}");
        assert_eq!(texture.format(), format);
        assert_eq!((texture.width(), texture.height()), (24, 16));
        if !format.is_compressed() {
            let expected = ctr::decode(format, 24, 16, &ctr::encode(format, 24, 16, &gradient(24, 16), None)?)?;
            assert_eq!(texture.rgba(), &expected[..]);
        }
    }

    // re-encoding decoded pixels reproduces the uncompressed payloads exactly
    let mut reencoded = read.clone();
    for texture in reencoded
        .textures
        .iter_mut()
        .filter(|t| !t.format().is_compressed())
    {
        let rgba = texture.rgba().to_vec();
        texture.set_rgba(24, 16, rgba)?;
    }
    let (second, _) = reencoded.write(&CtpkWriteOptions::default())?;
    assert_eq!(second, first);
    Ok(())
}
