use sha2::{Digest, Sha256};

// ###################################
// ->   Hashing utils
// ###################################
/// SHA-256 of `v`, as a lowercase hex string.
/// Used to store client ips without ever storing the ips themselves.
pub fn sha256_hex(v: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(v.as_ref()))
}

// ###################################
// ->   Error format chain
// ###################################
/// Calls `Error::source()` on a chain of errors and tries to write them to a `Formatter`.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current_src = e.source();
    while let Some(cause) = current_src {
        write!(f, "Caused by:\n\t{cause}")?;
        current_src = cause.source();
    }

    Ok(())
}
