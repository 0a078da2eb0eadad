/// Characters kept at the start of a masked token.
pub const DEFAULT_MASK_PREFIX: usize = 8;
/// Characters kept at the end of a masked token.
pub const DEFAULT_MASK_SUFFIX: usize = 4;

/// Mask a token for display, keeping `prefix` leading and `suffix` trailing
/// characters.
///
/// Tokens too short to hide anything once the visible parts are removed are
/// fully masked.
///
/// # Arguments
///
/// * `token` - The token text to mask
/// * `prefix` - Number of leading characters left visible
/// * `suffix` - Number of trailing characters left visible
pub fn mask_token(token: &str, prefix: usize, suffix: usize) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= prefix + suffix {
        return "*".repeat(chars.len().max(4));
    }

    let head: String = chars[..prefix].iter().collect();
    let tail: String = chars[chars.len() - suffix..].iter().collect();
    format!("{head}...{tail}")
}
