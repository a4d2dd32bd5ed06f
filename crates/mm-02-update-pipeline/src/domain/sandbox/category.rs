//! Category-specific sandbox tests and the payload parsers they share with
//! the appliers.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{SandboxSubject, SandboxTest};

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PE_MAGIC: &[u8] = b"MZ";
const BSDIFF_MAGIC: &[u8] = b"BSDIFF40";
const GGUF_MAGIC: &[u8] = b"GGUF";

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_u64_le(bytes: &[u8], at: usize) -> Option<u64> {
    let raw = bytes.get(at..at + 8)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}

// =============================================================================
// BINARY PATCH
// =============================================================================

/// The payload must start with a known executable or patch header.
pub struct BinaryHeaderCheck;

impl SandboxTest for BinaryHeaderCheck {
    fn name(&self) -> &'static str {
        "binary_signature"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let p = subject.payload.as_slice();
        if p.starts_with(ELF_MAGIC) || p.starts_with(PE_MAGIC) || p.starts_with(BSDIFF_MAGIC) {
            Ok(())
        } else {
            Err("unrecognised binary header".into())
        }
    }
}

/// Static load probe: the header must describe a loadable image.
pub struct ExecutionProbe;

impl ExecutionProbe {
    fn probe_elf(p: &[u8]) -> Result<(), String> {
        if p.len() < 52 {
            return Err("truncated ELF header".into());
        }
        if !matches!(p[4], 1 | 2) || !matches!(p[5], 1 | 2) || p[6] != 1 {
            return Err("invalid ELF identification".into());
        }
        Ok(())
    }

    fn probe_pe(p: &[u8]) -> Result<(), String> {
        let offset = read_u32_le(p, 0x3c).ok_or("truncated DOS header")? as usize;
        match p.get(offset..offset + 4) {
            Some(b"PE\0\0") => Ok(()),
            _ => Err("missing PE signature".into()),
        }
    }

    fn probe_bsdiff(p: &[u8]) -> Result<(), String> {
        let ctrl = read_u64_le(p, 8).ok_or("truncated bsdiff header")?;
        let diff = read_u64_le(p, 16).ok_or("truncated bsdiff header")?;
        read_u64_le(p, 24).ok_or("truncated bsdiff header")?;
        let body = (p.len() - 32) as u64;
        if ctrl.checked_add(diff).map_or(true, |blocks| blocks > body) {
            return Err("bsdiff block lengths exceed payload".into());
        }
        Ok(())
    }
}

impl SandboxTest for ExecutionProbe {
    fn name(&self) -> &'static str {
        "execution_probe"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let p = subject.payload.as_slice();
        if p.starts_with(ELF_MAGIC) {
            Self::probe_elf(p)
        } else if p.starts_with(BSDIFF_MAGIC) {
            Self::probe_bsdiff(p)
        } else if p.starts_with(PE_MAGIC) {
            Self::probe_pe(p)
        } else {
            Err("no loader for payload".into())
        }
    }
}

// =============================================================================
// MODEL WEIGHTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Gguf,
    Safetensors,
}

impl ModelFormat {
    pub fn detect(p: &[u8]) -> Option<Self> {
        if p.starts_with(GGUF_MAGIC) {
            return Some(ModelFormat::Gguf);
        }
        let header_len = read_u64_le(p, 0)?;
        let end = 8usize.checked_add(usize::try_from(header_len).ok()?)?;
        match p.get(8..end) {
            Some(header) if header.first() == Some(&b'{') => Some(ModelFormat::Safetensors),
            _ => None,
        }
    }
}

pub struct ModelFormatCheck;

impl SandboxTest for ModelFormatCheck {
    fn name(&self) -> &'static str {
        "model_format"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        ModelFormat::detect(&subject.payload)
            .map(|_| ())
            .ok_or_else(|| "neither GGUF nor safetensors".into())
    }
}

/// Checks that the weights describe at least one loadable tensor.
pub struct InferenceSmokeCheck;

impl InferenceSmokeCheck {
    fn smoke_gguf(p: &[u8]) -> Result<(), String> {
        let version = read_u32_le(p, 4).ok_or("truncated GGUF header")?;
        if !(1..=3).contains(&version) {
            return Err(format!("unsupported GGUF version {}", version));
        }
        let tensors = read_u64_le(p, 8).ok_or("truncated GGUF header")?;
        if tensors == 0 {
            return Err("model has no tensors".into());
        }
        Ok(())
    }

    fn smoke_safetensors(p: &[u8]) -> Result<(), String> {
        let header_len = read_u64_le(p, 0).ok_or("truncated header")? as usize;
        let header = p.get(8..8 + header_len).ok_or("truncated header")?;
        let data_len = (p.len() - 8 - header_len) as u64;
        let header: serde_json::Map<String, Value> =
            serde_json::from_slice(header).map_err(|e| format!("header is not JSON: {}", e))?;

        let mut tensors = 0usize;
        for (name, entry) in header.iter().filter(|(k, _)| k.as_str() != "__metadata__") {
            let dtype_ok = entry.get("dtype").and_then(Value::as_str).is_some();
            let shape_ok = entry.get("shape").and_then(Value::as_array).is_some();
            let end = entry
                .get("data_offsets")
                .and_then(Value::as_array)
                .and_then(|offsets| offsets.get(1))
                .and_then(Value::as_u64);
            match end {
                Some(end) if dtype_ok && shape_ok && end <= data_len => tensors += 1,
                _ => return Err(format!("tensor {:?} is malformed", name)),
            }
        }
        if tensors == 0 {
            return Err("model has no tensors".into());
        }
        Ok(())
    }
}

impl SandboxTest for InferenceSmokeCheck {
    fn name(&self) -> &'static str {
        "inference_smoke"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        match ModelFormat::detect(&subject.payload) {
            Some(ModelFormat::Gguf) => Self::smoke_gguf(&subject.payload),
            Some(ModelFormat::Safetensors) => Self::smoke_safetensors(&subject.payload),
            None => Err("unknown model format".into()),
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// The payload must be a JSON object with non-empty keys and bounded nesting.
pub struct ConfigSchemaCheck {
    max_depth: usize,
}

impl Default for ConfigSchemaCheck {
    fn default() -> Self {
        Self { max_depth: 16 }
    }
}

impl ConfigSchemaCheck {
    fn check(value: &Value, depth: usize, max_depth: usize) -> Result<(), String> {
        if depth > max_depth {
            return Err(format!("nesting deeper than {}", max_depth));
        }
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if key.trim().is_empty() {
                        return Err("empty key".into());
                    }
                    Self::check(child, depth + 1, max_depth)?;
                }
                Ok(())
            }
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| Self::check(item, depth + 1, max_depth)),
            _ => Ok(()),
        }
    }
}

impl SandboxTest for ConfigSchemaCheck {
    fn name(&self) -> &'static str {
        "config_schema"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let value: Value =
            serde_json::from_slice(&subject.payload).map_err(|e| format!("not JSON: {}", e))?;
        if !value.is_object() {
            return Err("top level must be an object".into());
        }
        Self::check(&value, 0, self.max_depth)
    }
}

// =============================================================================
// BLOCKED LIST
// =============================================================================

/// One host or address per line; blank lines and `#` comments are skipped.
pub fn parse_blocklist(payload: &[u8]) -> Result<Vec<String>, String> {
    let text = std::str::from_utf8(payload).map_err(|_| "blocklist is not UTF-8".to_string())?;
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        let valid = entry
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*' | ':'));
        if !valid {
            return Err(format!("line {}: invalid entry {:?}", line_no + 1, entry));
        }
        entries.push(entry.to_ascii_lowercase());
    }
    if entries.is_empty() {
        return Err("blocklist has no entries".into());
    }
    Ok(entries)
}

pub struct BlocklistFormatCheck;

impl SandboxTest for BlocklistFormatCheck {
    fn name(&self) -> &'static str {
        "blocklist_format"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        parse_blocklist(&subject.payload).map(|_| ())
    }
}

// =============================================================================
// PORTAL ASSETS
// =============================================================================

/// Parses `{"assets": {"<relative path>": "<content>", ...}}`.
pub fn parse_asset_manifest(payload: &[u8]) -> Result<BTreeMap<String, String>, String> {
    #[derive(serde::Deserialize)]
    struct Manifest {
        assets: BTreeMap<String, String>,
    }

    let manifest: Manifest =
        serde_json::from_slice(payload).map_err(|e| format!("bad asset manifest: {}", e))?;
    if manifest.assets.is_empty() {
        return Err("asset manifest is empty".into());
    }
    for path in manifest.assets.keys() {
        let escapes = path.split('/').any(|segment| segment == "..");
        if path.is_empty() || path.starts_with('/') || path.contains('\\') || escapes {
            return Err(format!("asset path {:?} is not a safe relative path", path));
        }
    }
    Ok(manifest.assets)
}

pub struct AssetManifestCheck;

impl SandboxTest for AssetManifestCheck {
    fn name(&self) -> &'static str {
        "asset_manifest"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        parse_asset_manifest(&subject.payload).map(|_| ())
    }
}
