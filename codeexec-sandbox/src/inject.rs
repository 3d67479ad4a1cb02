//! Writes submitted source into a sandbox before it starts

use crate::error::{SandboxError, SandboxResult};
use crate::registry::{LanguageProfile, WORKDIR};
use crate::sandbox::SandboxHandle;
use bytes::Bytes;
use std::path::{Component, Path};

/// Package `source` as a single-entry tar archive named after the profile's
/// source file.
pub fn build_payload(profile: &LanguageProfile, source: &str) -> SandboxResult<Bytes> {
    let filename = profile.source_filename.as_str();
    let mut components = Path::new(filename).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain {
        return Err(SandboxError::InjectionFailure(format!(
            "source filename '{}' must be a bare file name",
            filename
        )));
    }

    let body = source.as_bytes();
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);

    let archive_err =
        |e: std::io::Error| SandboxError::InjectionFailure(format!("failed to build archive: {}", e));

    let mut builder = tar::Builder::new(Vec::with_capacity(body.len() + 1024));
    builder
        .append_data(&mut header, filename, body)
        .map_err(archive_err)?;
    let archive = builder.into_inner().map_err(archive_err)?;

    Ok(Bytes::from(archive))
}

/// Write the submission into the sandbox's working directory
pub async fn inject(
    handle: &SandboxHandle,
    profile: &LanguageProfile,
    source: &str,
) -> SandboxResult<()> {
    if handle.language() != profile.id {
        return Err(SandboxError::InjectionFailure(format!(
            "sandbox was provisioned for '{}', not '{}'",
            handle.language(),
            profile.id
        )));
    }

    let payload = build_payload(profile, source)?;
    let size = payload.len();

    handle
        .engine()
        .upload(handle.id(), WORKDIR, payload)
        .await
        .map_err(|e| SandboxError::InjectionFailure(format!("{:#}", e)))?;

    tracing::debug!(
        execution_id = %handle.execution_id(),
        sandbox_id = %handle.id(),
        path = %profile.source_path(),
        archive_bytes = size,
        "Source injected"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LanguageRegistry;
    use assert_matches::assert_matches;
    use std::io::Read;

    fn entries(payload: &[u8]) -> Vec<(String, String)> {
        let mut archive = tar::Archive::new(payload);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let mut body = String::new();
                entry.read_to_string(&mut body).unwrap();
                (path, body)
            })
            .collect()
    }

    #[test]
    fn test_payload_uses_profile_filename() {
        let registry = LanguageRegistry::builtin();
        for profile in registry.profiles() {
            let payload = build_payload(profile, "source body").unwrap();
            assert_eq!(
                entries(&payload),
                vec![(profile.source_filename.clone(), "source body".to_string())]
            );
        }
    }

    #[test]
    fn test_payload_keeps_unicode() {
        let registry = LanguageRegistry::builtin();
        let code = "print(\"héllo ✓\")\n";
        let payload = build_payload(registry.resolve("python").unwrap(), code).unwrap();
        assert_eq!(entries(&payload)[0].1, code);
    }

    #[test]
    fn test_rejects_nested_filename() {
        let mut profile = LanguageRegistry::builtin().resolve("python").unwrap().clone();
        for bad in ["../main.py", "/etc/main.py", "src/main.py", ""] {
            profile.source_filename = bad.to_string();
            assert_matches!(
                build_payload(&profile, "x"),
                Err(SandboxError::InjectionFailure(_)),
                "{} should be rejected",
                bad
            );
        }
    }
}
