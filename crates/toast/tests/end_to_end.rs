use std::fs;

use pretty_assertions::assert_eq;
use toast::app::AppContext;
use toast::config::Config;
use toast::error::{Error, Result};
use toast::session::{self, backup::backup_path, BackupMode, ExportOptions, Textures};
use toast_archive::{Compression, Container, Directory, File};
use toast_cellanim::{
    ted, Animation, AnimationKey, Arrangement, ArrangementPart, CellAnim, Platform, Region,
};
use toast_texture::{CtpkTexture, CtrFormat, Ctpk, CtpkWriteOptions, RvlFormat, Tpl, TplTexture};
use tracing_test::traced_test;

const LEVEL: u32 = 3;

fn checkerboard(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            if (i % width + i / width) % 2 == 0 {
                [0xFF, 0x00, 0x00, 0xFF]
            } else {
                [0x00, 0xFF, 0x00, 0xFF]
            }
        })
        .collect()
}

fn cellanim(platform: Platform, name: &str) -> CellAnim {
    let mut cellanim = CellAnim::new(platform, name);
    cellanim.sheet_width = 8;
    cellanim.sheet_height = 8;
    cellanim.arrangements = vec![Arrangement {
        parts: vec![ArrangementPart {
            region: Region {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            },
            ..Default::default()
        }],
    }];
    cellanim.animations = vec![Animation {
        keys: vec![AnimationKey {
            hold_frames: 4,
            ..Default::default()
        }],
        ..Default::default()
    }];
    cellanim
}

fn pack(root: &Directory, container: Container, compression: Compression) -> Result<Vec<u8>> {
    let payload = container.write(root).map_err(Error::ArchiveWrite)?;
    compression.compress(&payload, LEVEL).map_err(Error::Compression)
}

fn rvl_archive() -> Result<Vec<u8>> {
    let tpl = Tpl {
        textures: vec![TplTexture::builder()
            .width(8)
            .height(8)
            .format(RvlFormat::Rgb5a3)
            .rgba(checkerboard(8, 8))
            .build()],
    };

    let mut root = Directory::default();
    let dot = root.directory_or_create(".");
    dot.insert_file(File::new(
        "cellanim.tpl",
        tpl.write().map_err(|e| Error::texture("cellanim.tpl", e))?,
    ));
    let test = cellanim(Platform::Rvl, "test");
    dot.insert_file(File::new(
        "test.brcad",
        test.write().map_err(|e| Error::cellanim("test.brcad", e))?,
    ));
    pack(&root, Container::U8, Compression::Yaz0)
}

fn ctr_archive() -> Result<Vec<u8>> {
    let mut ctpk = Ctpk {
        textures: vec![CtpkTexture::new(
            "sheet.bctex",
            CtrFormat::Rgba8888,
            8,
            8,
            checkerboard(8, 8),
        )
        .map_err(|e| Error::texture("ctr_test.ctpk", e))?],
    };
    let (ctpk_data, _) = ctpk
        .write(&CtpkWriteOptions::default())
        .map_err(|e| Error::texture("ctr_test.ctpk", e))?;

    let mut test = cellanim(Platform::Ctr, "ctr_test");
    test.animations[0].name = "BEAT".to_owned();

    let mut root = Directory::default();
    let arc = root.directory_or_create("arc");
    arc.insert_file(File::new(
        "ctr_test.bccad",
        test.write()
            .map_err(|e| Error::cellanim("ctr_test.bccad", e))?,
    ));
    arc.insert_file(File::new("ctr_test.ctpk", ctpk_data));
    pack(&root, Container::Sarc, Compression::Zlib)
}

fn options() -> ExportOptions {
    ExportOptions::builder().level(LEVEL).build()
}

#[traced_test]
#[test]
fn unmodified_rvl_archive_is_rebuilt_byte_for_byte() -> Result<()> {
    let data = rvl_archive()?;
    let mut document = session::open_bytes(&data)?;

    assert_eq!(document.platform, Platform::Rvl);
    assert_eq!(document.compression, Compression::Yaz0);
    assert_eq!(document.cellanims.len(), 1);
    assert_eq!(document.cellanims[0].name, "test");
    assert_eq!(document.cellanims[0].animations[0].name, "");

    let (rebuilt, report) = document.to_bytes(&options())?;
    assert!(report.downscaled.is_empty());
    assert_eq!(rebuilt, data);
    Ok(())
}

#[test]
fn ctr_archive_survives_an_export() -> Result<()> {
    let data = ctr_archive()?;
    let mut document = session::open_bytes(&data)?;
    assert_eq!(document.platform, Platform::Ctr);
    assert_eq!(document.sheet_files, vec![Some("ctr_test.ctpk".to_owned())]);

    document.cellanims[0].arrangements[0].parts[0].editor_visible = false;
    let (rebuilt, _) = document.to_bytes(&options())?;
    let reopened = session::open_bytes(&rebuilt)?;

    assert_eq!(reopened.compression, Compression::Zlib);
    assert_eq!(reopened.cellanims, document.cellanims);
    assert!(reopened
        .tree
        .find_file(&format!("arc/{}", ted::FILE_NAME))
        .is_some());
    let Textures::Ctr(sheets) = &reopened.textures else {
        panic!("expected CTR sheets");
    };
    assert_eq!(sheets["ctr_test.ctpk"].textures[0].rgba(), checkerboard(8, 8));
    Ok(())
}

#[test]
fn export_keeps_a_backup() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cellanim.szs");
    let data = rvl_archive()?;
    fs::write(&path, &data)?;

    let mut document = session::open(&path)?;
    document.cellanims[0].animations[0].name = "IDLE".to_owned();
    let report = session::export(&mut document, &path, &options())?;

    assert_eq!(report.backup, Some(backup_path(&path)));
    assert_eq!(fs::read(backup_path(&path))?, data);

    let reopened = session::open(&path)?;
    assert_eq!(reopened.cellanims[0].animations[0].name, "IDLE");
    assert!(reopened
        .tree
        .find_file("./rcad_test_labels.h")
        .is_some());
    Ok(())
}

#[test]
fn failed_backup_leaves_the_destination_alone() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cellanim.szs");
    let data = rvl_archive()?;
    fs::write(&path, &data)?;
    fs::create_dir(backup_path(&path))?;

    let mut document = session::open(&path)?;
    document.cellanims[0].animations[0].name = "IDLE".to_owned();
    let options = ExportOptions::builder()
        .level(LEVEL)
        .backup(BackupMode::Save)
        .build();

    assert!(matches!(
        session::export(&mut document, &path, &options),
        Err(Error::BackupFailed { .. })
    ));
    assert_eq!(fs::read(&path)?, data);
    Ok(())
}

#[test]
fn app_opens_archives_in_the_background() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.szs");
    let bad = dir.path().join("bad.szs");
    fs::write(&good, rvl_archive()?)?;
    fs::write(&bad, b"REFF not an archive")?;

    let app = AppContext::new(Config::default());
    app.open_async(&good)?;
    app.wait_idle();
    app.open_async(&bad)?;
    app.wait_idle();

    assert_eq!(app.sessions.len(), 1);
    assert_eq!(app.sessions.current(), Some(0));
    assert_eq!(app.sessions.with_current(|s| s.path.clone()), Some(good));
    let prompts = app.take_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("effect resource"));
    Ok(())
}
