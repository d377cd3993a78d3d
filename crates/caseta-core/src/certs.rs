// ── Credential bundle persistence ──
//
// Three PEM files in one directory. A bundle is usable only when all three
// exist and are non-empty; anything less is reported as missing. A save
// stages every artifact in a temp file before renaming any of them, and a
// failed rename puts the previous set back, so a failed save leaves the
// directory as it found it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{
    CA_CERT_FILE, CLIENT_CERT_FILE, CLIENT_KEY_FILE, CertificatePaths, CertificateStatus,
    CredentialBundle,
};

/// Reads and writes the credential bundle in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStore {
    directory: PathBuf,
}

impl CertificateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn paths(&self) -> CertificatePaths {
        CertificatePaths::in_dir(&self.directory)
    }

    /// Per-file presence. Empty or unreadable files count as absent.
    pub fn status(&self) -> CertificateStatus {
        let paths = self.paths();
        CertificateStatus {
            ca: is_present(&paths.ca_path),
            cert: is_present(&paths.cert_path),
            key: is_present(&paths.key_path),
        }
    }

    /// Load the bundle, failing with `CertificateMissing` unless all three
    /// artifacts are present and non-empty.
    pub fn load(&self) -> Result<CredentialBundle, CoreError> {
        let paths = self.paths();
        let ca_cert = read_artifact(&paths.ca_path);
        let client_cert = read_artifact(&paths.cert_path);
        let client_key = read_artifact(&paths.key_path);

        match (ca_cert, client_cert, client_key) {
            (Some(ca_cert), Some(client_cert), Some(client_key)) => {
                let client_key = String::from_utf8(client_key).map_err(|_| {
                    CoreError::InvalidCertificate {
                        message: format!("{} is not PEM text", paths.key_path.display()),
                    }
                })?;
                Ok(CredentialBundle {
                    ca_cert,
                    client_cert,
                    client_key: SecretString::from(client_key),
                    directory: self.directory.clone(),
                })
            }
            (ca, cert, key) => {
                let missing = [
                    (ca.is_none(), CA_CERT_FILE),
                    (cert.is_none(), CLIENT_CERT_FILE),
                    (key.is_none(), CLIENT_KEY_FILE),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(CoreError::CertificateMissing {
                    directory: self.directory.clone(),
                    missing,
                })
            }
        }
    }

    /// Persist `bundle` into this store's directory, replacing any existing
    /// artifacts. The private key is written with mode `0600` on Unix.
    pub fn save(&self, bundle: &CredentialBundle) -> Result<CertificatePaths, CoreError> {
        use secrecy::ExposeSecret;

        fs::create_dir_all(&self.directory).map_err(|source| CoreError::WriteError {
            path: self.directory.clone(),
            source,
        })?;

        let paths = self.paths();
        let staged = [
            stage(&paths.ca_path, &bundle.ca_cert, false)?,
            stage(&paths.cert_path, &bundle.client_cert, false)?,
            stage(
                &paths.key_path,
                bundle.client_key.expose_secret().as_bytes(),
                true,
            )?,
        ];
        commit(staged)?;

        info!(directory = %self.directory.display(), "credential bundle saved");
        Ok(paths)
    }
}

fn is_present(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn read_artifact(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            debug!(path = %path.display(), "credential file is empty");
            None
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "credential file unreadable");
            None
        }
    }
}

/// An artifact written and synced to a temp file beside its target.
struct Staged {
    target: PathBuf,
    tmp: NamedTempFile,
    previous: Option<Vec<u8>>,
}

fn stage(target: &Path, contents: &[u8], private: bool) -> Result<Staged, CoreError> {
    let write_error = |source| CoreError::WriteError {
        path: target.to_path_buf(),
        source,
    };
    let dir = target.parent().unwrap_or_else(|| Path::new("."));

    // NamedTempFile is created 0600 on Unix.
    let mut tmp = tempfile::Builder::new()
        .prefix(".caseta-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;
    tmp.write_all(contents).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;

    #[cfg(unix)]
    if !private {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644)).map_err(write_error)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(Staged {
        target: target.to_path_buf(),
        tmp,
        previous: fs::read(target).ok(),
    })
}

/// Rename every staged file into place. On the first failure the artifacts
/// already renamed are restored (or removed if they are new) and the
/// remaining temp files are dropped, which deletes them.
fn commit(staged: [Staged; 3]) -> Result<(), CoreError> {
    let mut committed: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
    for Staged {
        target,
        tmp,
        previous,
    } in staged
    {
        if let Err(e) = tmp.persist(&target) {
            roll_back(&committed);
            return Err(CoreError::WriteError {
                path: target,
                source: e.error,
            });
        }
        debug!(path = %target.display(), "wrote credential file");
        committed.push((target, previous));
    }
    Ok(())
}

fn roll_back(committed: &[(PathBuf, Option<Vec<u8>>)]) {
    for (target, previous) in committed.iter().rev() {
        let restored = match previous {
            Some(bytes) => fs::write(target, bytes),
            None => fs::remove_file(target),
        };
        match restored {
            Ok(()) => debug!(path = %target.display(), "rolled back credential file"),
            Err(e) => {
                warn!(path = %target.display(), error = %e, "could not roll back credential file");
            }
        }
    }
}
