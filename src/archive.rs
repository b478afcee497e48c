use std::fs;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tracing::warn;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::error::ExpdataError;

const DIGEST_BLOCK: usize = 1024 * 1024;

pub fn digest_stream<R: Read>(mut stream: R) -> Result<String, ExpdataError> {
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; DIGEST_BLOCK];
    loop {
        let count = stream
            .read(&mut block)
            .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        if count == 0 {
            break;
        }
        hasher.update(&block[..count]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn digest_file(path: &Utf8Path) -> Result<String, ExpdataError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(format!("open {path}: {err}")))?;
    digest_stream(file)
}

#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub source: Utf8PathBuf,
    pub archive: Utf8PathBuf,
    pub sidecar: Utf8PathBuf,
    pub digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct SessionArchiveReport {
    pub outcomes: Vec<ArchiveOutcome>,
    pub failures: Vec<(Utf8PathBuf, String)>,
}

pub fn pack_session(path: &Utf8Path) -> Result<ArchiveOutcome, ExpdataError> {
    if !path.is_dir() {
        return Err(ExpdataError::Filesystem(format!(
            "not a session directory: {path}"
        )));
    }
    // Session folders may contain dots, so the suffix is appended rather
    // than swapped in.
    let archive = Utf8PathBuf::from(format!("{path}.zip"));
    let sidecar = Utf8PathBuf::from(format!("{path}.sha256"));

    write_archive(path, &archive)?;
    validate_members(&archive, path)?;

    let digest = digest_file(&archive)?;
    fs::write(sidecar.as_std_path(), &digest)
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    fs::remove_dir_all(path.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;

    Ok(ArchiveOutcome {
        source: path.to_owned(),
        archive,
        sidecar,
        digest,
    })
}

pub fn archive_sessions(root: &Utf8Path) -> Result<SessionArchiveReport, ExpdataError> {
    let entries = fs::read_dir(root.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    let mut sessions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
            ExpdataError::Filesystem(format!("non-utf8 path {}", path.display()))
        })?;
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();

    let mut report = SessionArchiveReport::default();
    for session in sessions {
        match pack_session(&session) {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(err) => {
                warn!(session = %session, error = %err, "failed to archive session");
                report.failures.push((session, err.to_string()));
            }
        }
    }
    Ok(report)
}

pub fn validate_members(archive: &Utf8Path, source: &Utf8Path) -> Result<(), ExpdataError> {
    let file = fs::File::open(archive.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(format!("open zip {archive}: {err}")))?;
    let mut bundle =
        ZipArchive::new(file).map_err(|err| ExpdataError::Archive(err.to_string()))?;

    for at in 0..bundle.len() {
        let mut entry = bundle
            .by_index(at)
            .map_err(|err| ExpdataError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let relative = match entry.enclosed_name() {
            Some(path) => path,
            None => {
                return Err(ExpdataError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };
        let member = entry.name().to_string();
        let counterpart = Utf8PathBuf::from_path_buf(source.as_std_path().join(relative))
            .map_err(|path| {
                ExpdataError::Filesystem(format!("non-utf8 path {}", path.display()))
            })?;
        let member_digest = digest_stream(&mut entry)?;
        if !counterpart.is_file() {
            continue;
        }
        let file_digest = digest_file(&counterpart)?;
        if member_digest != file_digest {
            return Err(ExpdataError::Integrity {
                archive: archive.to_owned(),
                member,
            });
        }
    }
    Ok(())
}

pub fn sidecar_path(archive: &Utf8Path) -> Utf8PathBuf {
    match archive.as_str().strip_suffix(".zip") {
        Some(stem) => Utf8PathBuf::from(format!("{stem}.sha256")),
        None => Utf8PathBuf::from(format!("{archive}.sha256")),
    }
}

pub fn verify_sidecar(archive: &Utf8Path) -> Result<(), ExpdataError> {
    let sidecar = sidecar_path(archive);
    if !sidecar.is_file() {
        return Err(ExpdataError::MissingSidecar(sidecar));
    }
    let recorded = fs::read_to_string(sidecar.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    let actual = digest_file(archive)?;
    if recorded.trim() != actual {
        return Err(ExpdataError::SidecarMismatch(archive.to_owned()));
    }
    Ok(())
}

fn write_archive(source: &Utf8Path, archive: &Utf8Path) -> Result<(), ExpdataError> {
    let parent = archive
        .parent()
        .ok_or_else(|| ExpdataError::Filesystem("invalid archive path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("expdata-zip")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;

    let mut writer = zip::ZipWriter::new(temp.as_file());
    for entry in walk_dir(source)? {
        let relative = entry
            .strip_prefix(source)
            .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        writer
            .start_file(relative.as_str(), SimpleFileOptions::default())
            .map_err(|err| ExpdataError::Archive(err.to_string()))?;
        let mut file = fs::File::open(entry.as_std_path())
            .map_err(|err| ExpdataError::Filesystem(format!("open {entry}: {err}")))?;
        io::copy(&mut file, &mut writer)
            .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    }
    writer
        .finish()
        .map_err(|err| ExpdataError::Archive(err.to_string()))?;

    if archive.as_std_path().exists() {
        fs::remove_file(archive.as_std_path())
            .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    }
    temp.persist(archive.as_std_path())
        .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
    Ok(())
}

fn walk_dir(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ExpdataError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ExpdataError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
                ExpdataError::Filesystem(format!("non-utf8 path {}", path.display()))
            })?;
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_known_value() {
        let digest = digest_stream(&b"hello world"[..]).unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn digest_is_deterministic() {
        let first = digest_stream(&b"session data"[..]).unwrap();
        let second = digest_stream(&b"session data"[..]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sidecar_sits_beside_archive() {
        assert_eq!(
            sidecar_path(Utf8Path::new("/data/20230101 run.zip")),
            Utf8PathBuf::from("/data/20230101 run.sha256")
        );
        assert_eq!(
            sidecar_path(Utf8Path::new("/data/bundle")),
            Utf8PathBuf::from("/data/bundle.sha256")
        );
    }
}
