//! Content fingerprints used for cache invalidation

/// Hex blake3 digest of a file's bytes. Never derived from mtimes.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Order-independent digest over `(path, fingerprint)` pairs.
pub fn content_digest<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut lines: Vec<String> = pairs
        .into_iter()
        .map(|(path, fingerprint)| format!("{path}:{fingerprint}"))
        .collect();
    lines.sort();

    let mut hasher = blake3::Hasher::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
