pub fn vec_to_int(bits: &[u8]) -> u8 {
    bits.iter()
        .filter(|&x| *x == 0 || *x == 1)
        .fold(0, |acc, &bit| (acc << 1) ^ bit)
}

/// Literal substring search over raw bytes. An empty needle always matches.
pub fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }

    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
