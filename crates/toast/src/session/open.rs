//! Opening an archive into a [`Document`]
//!
//! An archive is a compressed container holding one directory of cellanim files:
//!
//! | Platform | Directory | Cellanims | Sheets                         | Names                      |
//! |----------|-----------|-----------|--------------------------------|----------------------------|
//! | RVL      | `.`       | `*.brcad` | `cellanim.tpl`, one texture each | `rcad_<name>_labels.h`   |
//! | CTR      | `arc`     | `*.bccad` | `*.ctpk`, paired by file name  | inside the cellanim        |
//!
//! Either may carry the editor metadata sidecar.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use toast_archive::{compression::Compression, Container, Directory};
use toast_cellanim::{labels, ted, CellAnim, EditorMetadata, Platform};
use toast_texture::{Ctpk, Tpl};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};

/// Directory holding the cellanim files of a RVL archive
pub const RVL_ROOT: &str = ".";

/// Directory holding the cellanim files of a CTR archive
pub const CTR_ROOT: &str = "arc";

/// Texture file every RVL archive carries
pub const TPL_NAME: &str = "cellanim.tpl";

/// Sheets of an archive
#[derive(Debug, Clone, PartialEq)]
pub enum Textures {
    /// One TPL, cellanims pick a texture by their sheet index
    Rvl(Tpl),

    /// CTPK files by file name
    Ctr(IndexMap<String, Ctpk>),
}

/// An opened cellanim archive
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub platform: Platform,
    pub compression: Compression,
    pub container: Container,

    /// Every file of the archive as read; export replaces the files the document owns
    pub tree: Directory,
    pub cellanims: Vec<CellAnim>,
    pub textures: Textures,

    /// CTR only: CTPK file each cellanim was paired with
    pub sheet_files: Vec<Option<String>>,

    /// The archive carried the legacy sidecar, which is replaced on export
    pub legacy_sidecar: bool,
}

impl Document {
    /// Directory holding the cellanim files
    pub fn root_name(&self) -> &'static str {
        match self.platform {
            Platform::Rvl => RVL_ROOT,
            Platform::Ctr => CTR_ROOT,
        }
    }
}

/// Diagnose files that are not cellanim archives at all
fn foreign_kind(data: &[u8]) -> Option<Error> {
    match data.get(..4)? {
        b"bres" | b"CGFX" => Some(Error::ModelResource),
        b"REFF" | b"EFTF" => Some(Error::EffectResource),
        _ => None,
    }
}

/// Length of the longest common substring of `a` and `b`
fn longest_common_substring(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut previous = vec![0usize; b.len() + 1];
    let mut best = 0;
    for &x in a {
        let mut current = vec![0usize; b.len() + 1];
        for (j, &y) in b.iter().enumerate() {
            if x == y {
                current[j + 1] = previous[j] + 1;
                best = best.max(current[j + 1]);
            }
        }
        previous = current;
    }
    best
}

/// The candidate sharing the longest run of characters with `stem`
///
/// This is a best effort guess: file names are not required to match, so two sheets with similar
/// names can be confused. Ties go to the first candidate.
pub fn best_sheet_match<'a>(stem: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for &candidate in candidates {
        let candidate_stem = candidate.rsplit_once('.').map_or(candidate, |(s, _)| s);
        let length = longest_common_substring(stem, candidate_stem);
        if length > 0 && best.map_or(true, |(_, b)| length > b) {
            best = Some((candidate, length));
        }
    }
    best.map(|(c, _)| c)
}

/// Read and open the archive at `path`
pub fn open(path: &Path) -> Result<Document> {
    let data = fs::read(path).map_err(|source| Error::FileRead {
        path: path.to_owned(),
        source,
    })?;
    info!("opening {}", path.display());
    open_bytes(&data)
}

/// Open an archive held in memory
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn open_bytes(data: &[u8]) -> Result<Document> {
    let compression = Compression::detect(data);
    if compression == Compression::None && Container::detect(data).is_none() {
        return Err(foreign_kind(data).unwrap_or(Error::UnknownCompression));
    }

    let payload = compression.decompress(data).map_err(Error::Decompression)?;
    let Some(container) = Container::detect(&payload) else {
        return Err(foreign_kind(&payload).unwrap_or(Error::InvalidContainer(
            toast_archive::error::Error::InvalidArchive("U8 or SARC"),
        )));
    };
    let tree = container.read(&payload).map_err(Error::InvalidContainer)?;
    debug!(%compression, %container, files = tree.file_count(), "read archive tree");

    if tree.contains_directory_named("blyt") {
        return Err(Error::LayoutArchive);
    }

    match container {
        Container::U8 => open_rvl(compression, tree),
        Container::Sarc => open_ctr(compression, tree),
    }
}

/// Names of the files of `root` ending in `.extension`, in directory order
fn files_with_extension<'a>(root: &'a Directory, extension: &str) -> Vec<&'a str> {
    root.files
        .iter()
        .filter(|f| f.name.rsplit_once('.').is_some_and(|(_, e)| e == extension))
        .map(|f| f.name.as_str())
        .collect()
}

fn read_cellanims(root: &Directory, platform: Platform) -> Result<Vec<CellAnim>> {
    let names = files_with_extension(root, platform.extension());
    if names.is_empty() {
        return Err(Error::MissingFile(format!("*.{}", platform.extension())));
    }

    names
        .into_iter()
        .map(|name| {
            let file = root
                .file(name)
                .ok_or_else(|| Error::MissingFile(name.to_owned()))?;
            let mut cellanim = CellAnim::read(platform, file.stem(), &file.data)
                .map_err(|e| Error::cellanim(name, e))?;

            if platform == Platform::Rvl {
                let label_name = labels::file_name(file.stem());
                if let Some(header) = root.file(&label_name) {
                    labels::apply(&labels::parse(&header.data), &mut cellanim.animations);
                }
            }
            Ok(cellanim)
        })
        .collect()
}

/// Apply the sidecar, returning whether it was the legacy one
fn read_sidecar(root: &Directory, cellanims: &mut [CellAnim]) -> Result<bool> {
    let (file, legacy) = match (root.file(ted::FILE_NAME), root.file(ted::LEGACY_FILE_NAME)) {
        (Some(file), _) => (file, false),
        (None, Some(file)) => (file, true),
        (None, None) => return Ok(false),
    };

    let metadata = EditorMetadata::read(&file.data).map_err(|e| Error::cellanim(&file.name, e))?;
    metadata.apply(cellanims);
    if legacy {
        info!("found legacy sidecar, it will be upgraded on export");
    }
    Ok(legacy)
}

fn open_rvl(compression: Compression, tree: Directory) -> Result<Document> {
    let root = tree
        .directory(RVL_ROOT)
        .ok_or(Error::RootDirectoryMissing(RVL_ROOT))?;

    let tpl_file = root
        .file(TPL_NAME)
        .ok_or_else(|| Error::MissingFile(TPL_NAME.to_owned()))?;
    let tpl = Tpl::read(&tpl_file.data).map_err(|e| Error::texture(TPL_NAME, e))?;
    if tpl.textures.is_empty() {
        return Err(Error::NoTextures(TPL_NAME.to_owned()));
    }

    let mut cellanims = read_cellanims(root, Platform::Rvl)?;
    let legacy_sidecar = read_sidecar(root, &mut cellanims)?;
    for cellanim in &cellanims {
        if cellanim.sheet_index as usize >= tpl.textures.len() {
            warn!(
                cellanim = %cellanim.name,
                sheet = cellanim.sheet_index,
                "cellanim uses a sheet the texture file does not have"
            );
        }
    }

    Ok(Document {
        platform: Platform::Rvl,
        compression,
        container: Container::U8,
        sheet_files: vec![None; cellanims.len()],
        cellanims,
        textures: Textures::Rvl(tpl),
        legacy_sidecar,
        tree,
    })
}

fn open_ctr(compression: Compression, tree: Directory) -> Result<Document> {
    let root = tree
        .directory(CTR_ROOT)
        .ok_or(Error::RootDirectoryMissing(CTR_ROOT))?;

    let mut cellanims = read_cellanims(root, Platform::Ctr)?;
    let legacy_sidecar = read_sidecar(root, &mut cellanims)?;

    let candidates = files_with_extension(root, "ctpk");
    let mut textures = IndexMap::new();
    let mut sheet_files = Vec::with_capacity(cellanims.len());
    for cellanim in &cellanims {
        let name = best_sheet_match(&cellanim.name, &candidates)
            .ok_or_else(|| Error::MissingFile(format!("{}.ctpk", cellanim.name)))?;
        debug!(cellanim = %cellanim.name, sheet = name, "paired cellanim with sheet");

        if !textures.contains_key(name) {
            let file = root
                .file(name)
                .ok_or_else(|| Error::MissingFile(name.to_owned()))?;
            let ctpk = Ctpk::read(&file.data).map_err(|e| Error::texture(name, e))?;
            if ctpk.textures.is_empty() {
                return Err(Error::NoTextures(name.to_owned()));
            }
            textures.insert(name.to_owned(), ctpk);
        }
        sheet_files.push(Some(name.to_owned()));
    }

    Ok(Document {
        platform: Platform::Ctr,
        compression,
        container: Container::Sarc,
        cellanims,
        textures: Textures::Ctr(textures),
        sheet_files,
        legacy_sidecar,
        tree,
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use toast_archive::{compression::Compression, Container, Directory, File};

    use super::{best_sheet_match, longest_common_substring, open_bytes};
    use crate::error::{Error, Result};

    fn pack(root: &Directory, container: Container, compression: Compression) -> Result<Vec<u8>> {
        let payload = container.write(root).map_err(Error::ArchiveWrite)?;
        compression.compress(&payload, 1).map_err(Error::Compression)
    }

    #[test]
    fn common_substrings() {
        assert_eq!(longest_common_substring("agb_tap", "agb_tap_long"), 7);
        assert_eq!(longest_common_substring("rhythm", "algorithm"), 4);
        assert_eq!(longest_common_substring("abc", "xyz"), 0);
        assert_eq!(longest_common_substring("", "xyz"), 0);
    }

    #[test]
    fn sheet_pairing_prefers_the_longest_match() {
        let candidates = ["cellanim.ctpk", "agb_tap.ctpk", "agb_tap_long.ctpk"];
        assert_eq!(best_sheet_match("agb_tap", &candidates), Some("agb_tap.ctpk"));
        assert_eq!(best_sheet_match("agb_tap_long", &candidates), Some("agb_tap_long.ctpk"));
        assert_eq!(best_sheet_match("cellanim_b", &candidates), Some("cellanim.ctpk"));
        assert_eq!(best_sheet_match("zzz", &candidates), None);
    }

    #[test]
    fn foreign_files_are_diagnosed() {
        assert!(matches!(open_bytes(b"bres\0\0\0\0"), Err(Error::ModelResource)));
        assert!(matches!(open_bytes(b"CGFX\0\0\0\0"), Err(Error::ModelResource)));
        assert!(matches!(open_bytes(b"REFF\0\0\0\0"), Err(Error::EffectResource)));
        assert!(matches!(open_bytes(b"EFTF\0\0\0\0"), Err(Error::EffectResource)));
        assert!(matches!(open_bytes(b"PK\x03\x04"), Err(Error::UnknownCompression)));
    }

    #[test]
    fn compressed_foreign_files_are_diagnosed() -> Result<()> {
        let data = Compression::Yaz0
            .compress(b"bres and then some model data", 1)
            .map_err(Error::Compression)?;
        assert!(matches!(open_bytes(&data), Err(Error::ModelResource)));

        let data = Compression::Yaz0
            .compress(b"neither an archive nor a resource", 1)
            .map_err(Error::Compression)?;
        assert!(matches!(open_bytes(&data), Err(Error::InvalidContainer(_))));
        Ok(())
    }

    #[test]
    fn corrupt_streams_are_reported() {
        let mut data = b"Yaz0".to_vec();
        data.extend_from_slice(&0x100u32.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.push(0x00);
        assert!(matches!(open_bytes(&data), Err(Error::Decompression(_))));
    }

    #[test]
    fn layout_archives_are_rejected() -> Result<()> {
        let mut root = Directory::default();
        root.directory_or_create(".")
            .directory_or_create("blyt")
            .insert_file(File::new("a.brlyt", b"RLYT".to_vec()));
        let data = pack(&root, Container::U8, Compression::Yaz0)?;
        assert!(matches!(open_bytes(&data), Err(Error::LayoutArchive)));
        Ok(())
    }

    #[test]
    fn missing_pieces_are_reported() -> Result<()> {
        let mut root = Directory::default();
        root.directory_or_create("elsewhere")
            .insert_file(File::new("x.bin", vec![1]));
        let data = pack(&root, Container::U8, Compression::Yaz0)?;
        assert!(matches!(open_bytes(&data), Err(Error::RootDirectoryMissing("."))));

        let data = pack(&root, Container::Sarc, Compression::Zlib)?;
        assert!(matches!(open_bytes(&data), Err(Error::RootDirectoryMissing("arc"))));

        let mut root = Directory::default();
        root.directory_or_create(".")
            .insert_file(File::new("test.brcad", vec![0; 4]));
        let data = pack(&root, Container::U8, Compression::Yaz0)?;
        assert!(matches!(open_bytes(&data), Err(Error::MissingFile(name)) if name == "cellanim.tpl"));
        Ok(())
    }
}
