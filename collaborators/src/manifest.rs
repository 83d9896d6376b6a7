//! C2PA manifest-signing collaborator, grounded in
//! `original_source/artorize_runner/c2pa_metadata.py`. Manifest JSON
//! construction, XMP packet synthesis, and the self-signed-certificate
//! fallback are all local computation with no required external service.
//!
//! This crate has no binding to the upstream `c2pa` SDK (not in the
//! teacher's or pack's dependency surface — noted in `DESIGN.md`), so
//! "signing" here means: generate a self-signed RSA certificate, sign a
//! SHA-256 digest of the source asset with it, and record that signature
//! alongside the manifest rather than embedding a C2PA box into the image
//! itself.

use chrono::Utc;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::sha2::{Digest, Sha256};
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_LICENSE_TEXT: &str = "AI Training License (ArtScraper) v1.0 - Short Form\nLicensor grants to any user a worldwide, non-exclusive, transferable, sublicensable, irrevocable, royalty-free license to reproduce, analyze, text- and data-mine, and use the Work to train, fine-tune, evaluate, and improve machine-learning models and related systems, and to generate and use outputs from such models. This license includes rights in any database or sui generis database rights and, to the maximum extent permitted, a waiver of moral rights and analogous rights. No endorsement implied. No removal of provenance or Content Credentials. Full terms, definitions, and limitations of liability: https://artscraper.local/licenses/ai-training-v1. Effective date: 2025-09-18. License ID: LicenseRef-AI-Training-Permissive-1.0.";

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    pub claim_generator: String,
    pub title_prefix: String,
    pub policy_url: String,
    pub identity_did: Option<String>,
    pub license_id: String,
    pub license_url: String,
    pub offered_by: String,
    pub effective_date: String,
    pub license_text: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            claim_generator: "artscraper/rust-gateway/1.0".to_string(),
            title_prefix: "ArtScraper Protected Asset".to_string(),
            policy_url: "https://artscraper.local/licenses/ai-training-v1".to_string(),
            identity_did: Some("did:web:artscraper.local".to_string()),
            license_id: "LicenseRef-AI-Training-Permissive-1.0".to_string(),
            license_url: "https://artscraper.local/licenses/ai-training-v1".to_string(),
            offered_by: "did:web:artscraper.local".to_string(),
            effective_date: "2025-09-18".to_string(),
            license_text: DEFAULT_LICENSE_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestArtifacts {
    pub signed_path: PathBuf,
    pub manifest_path: PathBuf,
    pub certificate_path: PathBuf,
    pub license_path: Option<PathBuf>,
    pub xmp_path: PathBuf,
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("certificate generation failed: {0}")]
    Certificate(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ManifestSigner: Send + Sync {
    fn sign(
        &self,
        source_path: &Path,
        dest_dir: &Path,
        config: &ManifestConfig,
        asset_id: Option<&str>,
    ) -> Result<ManifestArtifacts, ManifestError>;
}

pub struct LocalManifestSigner;

impl LocalManifestSigner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalManifestSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestSigner for LocalManifestSigner {
    fn sign(
        &self,
        source_path: &Path,
        dest_dir: &Path,
        config: &ManifestConfig,
        asset_id: Option<&str>,
    ) -> Result<ManifestArtifacts, ManifestError> {
        std::fs::create_dir_all(dest_dir)?;

        let asset_title = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());

        let license_checksum = sha256_hex(config.license_text.trim().as_bytes());
        let manifest = build_manifest(config, &asset_title, asset_id, &license_checksum);

        let (cert_pem, key_pem, signing_key) = generate_self_signed(
            config.identity_did.as_deref().unwrap_or("did:web:artscraper.local"),
        )?;

        let source_bytes = std::fs::read(source_path)?;
        let digest = sha256_hex(&source_bytes);
        let signature = signing_key.sign_with_rng(&mut rand::rngs::OsRng, &source_bytes);
        let signature_hex = hex_encode(&signature.to_bytes());

        let mut manifest = manifest;
        manifest["signature"] = serde_json::json!({
            "algorithm": "RSA-PKCS1v15-SHA256",
            "asset_sha256": digest,
            "value": signature_hex,
        });

        let signed_path = dest_dir.join(
            source_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("signed")),
        );
        std::fs::write(&signed_path, &source_bytes)?;

        let manifest_path = dest_dir.join("manifest.json");
        std::fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&manifest).unwrap_or_default(),
        )?;

        let certificate_path = dest_dir.join("certificate.pem");
        std::fs::write(&certificate_path, format!("{cert_pem}\n{key_pem}"))?;

        let license_text = config.license_text.trim();
        let license_path = if license_text.is_empty() {
            None
        } else {
            let path = dest_dir.join("license.txt");
            std::fs::write(&path, format!("{license_text}\n"))?;
            Some(path)
        };

        let xmp = build_xmp_packet(config, &asset_title);
        let xmp_path = dest_dir.join(format!("{asset_title}.xmp"));
        std::fs::write(&xmp_path, format!("{xmp}\n"))?;

        Ok(ManifestArtifacts {
            signed_path,
            manifest_path,
            certificate_path,
            license_path,
            xmp_path,
        })
    }
}

fn build_manifest(
    config: &ManifestConfig,
    asset_title: &str,
    asset_id: Option<&str>,
    license_checksum: &str,
) -> serde_json::Value {
    let title = if config.title_prefix.is_empty() {
        asset_title.to_string()
    } else {
        format!("{}: {}", config.title_prefix, asset_title)
    };

    let mut assertions = vec![
        serde_json::json!({
            "label": "cawg.training-mining",
            "data": {
                "entries": {
                    "cawg.ai_generative_training": {"use": "allowed", "policy": config.policy_url},
                    "cawg.ai_inference": {"use": "allowed"},
                }
            }
        }),
        serde_json::json!({
            "label": "com.artscraper.license",
            "data": {
                "license_id": config.license_id,
                "license_url": config.license_url,
                "license_sha256": license_checksum,
                "effective_date": config.effective_date,
                "offered_by": config.offered_by,
            }
        }),
        serde_json::json!({
            "label": "com.artscraper.license-text",
            "data": {
                "content_type": "text/plain",
                "text": config.license_text,
            }
        }),
    ];

    if let Some(did) = &config.identity_did {
        assertions.push(serde_json::json!({
            "label": "cawg.identity",
            "data": {"did": did, "scope": "asset"},
        }));
    }

    let mut manifest = serde_json::json!({
        "claim_generator": config.claim_generator,
        "title": title,
        "assertions": assertions,
        "signed_at": Utc::now().to_rfc3339(),
    });
    if let Some(id) = asset_id {
        manifest["instance_id"] = serde_json::Value::String(id.to_string());
    }
    manifest
}

fn build_xmp_packet(config: &ManifestConfig, asset_title: &str) -> String {
    let rights_statement = format!(
        "AI training and inference allowed under {} ({}).",
        config.license_id, config.license_url
    );
    format!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/" xmlns:dc="http://purl.org/dc/elements/1.1/"
 xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
 xmlns:iptcExt="http://iptc.org/std/Iptc4xmpExt/2008-02-29/"
 xmlns:plus="http://ns.useplus.org/ldf/xmp/1.0/">
 <rdf:RDF>
  <rdf:Description rdf:about=""
   plus:DataMining="allowed"
   plus:LicensorCopyrightNotice="{license_id}"
   plus:LicensorURL="{license_url}">
   <dc:title>
    <rdf:Alt>
     <rdf:li xml:lang="x-default">{asset_title}</rdf:li>
    </rdf:Alt>
   </dc:title>
   <dc:rights>
    <rdf:Alt>
     <rdf:li xml:lang="x-default">{rights_statement}</rdf:li>
    </rdf:Alt>
   </dc:rights>
   <iptcExt:ModelReleaseTerms>{license_url}</iptcExt:ModelReleaseTerms>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#,
        license_id = config.license_id,
        license_url = config.license_url,
        asset_title = asset_title,
        rights_statement = rights_statement,
    )
}

fn generate_self_signed(
    common_name: &str,
) -> Result<(String, String, SigningKey<Sha256>), ManifestError> {
    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
        .map_err(|e| ManifestError::KeyGeneration(e.to_string()))?;

    let key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| ManifestError::KeyGeneration(e.to_string()))?
        .to_string();

    let key_der = private_key
        .to_pkcs8_der()
        .map_err(|e| ManifestError::KeyGeneration(e.to_string()))?;
    let rcgen_key = rcgen::KeyPair::from_der(key_der.as_bytes())
        .map_err(|e| ManifestError::Certificate(e.to_string()))?;

    let mut params = rcgen::CertificateParams::new(Vec::new())
        .map_err(|e| ManifestError::Certificate(e.to_string()))?;
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2030, 1, 1);

    let cert = params
        .self_signed(&rcgen_key)
        .map_err(|e| ManifestError::Certificate(e.to_string()))?;
    let cert_pem = cert.pem();

    let signing_key = SigningKey::<Sha256>::new(private_key);

    Ok((cert_pem, key_pem, signing_key))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_writes_all_expected_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("input.png");
        std::fs::write(&source_path, b"not really a png").unwrap();

        let dest_dir = dir.path().join("c2pa");
        let signer = LocalManifestSigner::new();
        let artifacts = signer
            .sign(&source_path, &dest_dir, &ManifestConfig::default(), Some("asset-1"))
            .unwrap();

        assert!(artifacts.signed_path.is_file());
        assert!(artifacts.manifest_path.is_file());
        assert!(artifacts.certificate_path.is_file());
        assert!(artifacts.license_path.unwrap().is_file());
        assert!(artifacts.xmp_path.is_file());

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.manifest_path).unwrap())
                .unwrap();
        assert_eq!(manifest["instance_id"], "asset-1");
        assert!(manifest["signature"]["asset_sha256"].is_string());
    }
}
