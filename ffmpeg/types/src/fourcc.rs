/*!
    Four-character codec tags.
*/

/**
    Pack four ASCII characters into a little-endian tag.

    Returns `None` unless `name` is exactly four bytes long.
*/
pub fn fourcc_from_str(name: &str) -> Option<u32> {
    let bytes: [u8; 4] = name.as_bytes().try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/**
    Render a tag the way FFmpeg prints it.

    Letters, digits and `. -_` are printed as is, every other byte as
    `[n]`.
*/
pub fn fourcc_to_string(tag: u32) -> String {
    let mut out = String::new();
    for byte in tag.to_le_bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b' ' | b'-' | b'_') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("[{byte}]"));
        }
    }
    out
}
