//! Deterministic password derivation.
//!
//! The derivation is a fixed hash chain and must stay byte-identical across
//! platforms and releases, since users re-derive the same password years
//! later from nothing but their master password and the preset:
//!
//! ```text
//! base     = master || identifier || decimal(iteration)
//! digest_a = SHA-384(base)                        48 bytes
//! tweaked  = digest_a, last byte mod 3 if long
//! digest_b = SHA-1(tweaked)                       20 bytes
//! raw      = digest_a[offset .. offset + slice]  offset picked by digest_b[19]
//! password = base64(raw) + one symbol per round, positions picked by digest_b
//! ```
//!
//! All digest buffers are zeroed before [`derive`] returns.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use sha1::Sha1;
use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha384};
use thiserror::Error;
use zeroize::Zeroizing;

use pwm_types::IdentifierPreset;

const SHA384_LEN: usize = 48;
const SHA1_LEN: usize = 20;

/// Error type for password derivation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    /// The symbol alphabet has no characters to pick from.
    #[error("symbol alphabet is empty")]
    EmptyAlphabet,
}

/// Password length mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PasswordMode {
    /// 16 base64 characters plus 8 symbols.
    #[default]
    Long,
    /// 8 base64 characters plus 4 symbols.
    Short,
}

impl PasswordMode {
    /// Map the stored `longpw` flag to a mode.
    pub fn from_long_flag(long: bool) -> Self {
        if long {
            Self::Long
        } else {
            Self::Short
        }
    }

    /// Whether this is the long mode.
    pub fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    /// Bytes of the first digest that feed the base64 body.
    pub const fn slice_len(self) -> usize {
        match self {
            Self::Long => 12,
            Self::Short => 6,
        }
    }

    /// Length of the base64 body (no padding).
    pub const fn base_len(self) -> usize {
        match self {
            Self::Long => 16,
            Self::Short => 8,
        }
    }

    /// Number of symbols inserted into the body.
    pub const fn symbol_rounds(self) -> usize {
        match self {
            Self::Long => 8,
            Self::Short => 4,
        }
    }

    /// Final password length in characters.
    pub const fn output_len(self) -> usize {
        self.base_len() + self.symbol_rounds()
    }

    /// Start of the raw slice inside the first digest.
    ///
    /// Always satisfies `offset + slice_len() <= 48`.
    fn slice_offset(self, selector: u8) -> usize {
        match self {
            Self::Long => usize::from(selector % 4) * 12,
            Self::Short => usize::from(selector % 8) * 6,
        }
    }
}

impl From<bool> for PasswordMode {
    fn from(long: bool) -> Self {
        Self::from_long_flag(long)
    }
}

/// Derive the password for `identifier` from `master`.
///
/// `alphabet` is indexed by `char`; duplicate characters are allowed and
/// simply weight the pick. Returns [`DeriveError::EmptyAlphabet`] when
/// `alphabet` is empty.
pub fn derive(
    master: &str,
    identifier: &str,
    iteration: u32,
    alphabet: &str,
    mode: PasswordMode,
) -> Result<String, DeriveError> {
    let symbols: Vec<char> = alphabet.chars().collect();
    if symbols.is_empty() {
        return Err(DeriveError::EmptyAlphabet);
    }

    let iteration = iteration.to_string();
    let mut base = Zeroizing::new(Vec::with_capacity(
        master.len() + identifier.len() + iteration.len(),
    ));
    base.extend_from_slice(master.as_bytes());
    base.extend_from_slice(identifier.as_bytes());
    base.extend_from_slice(iteration.as_bytes());

    let mut digest_a = Zeroizing::new([0u8; SHA384_LEN]);
    let mut hasher = Sha384::new();
    hasher.update(base.as_slice());
    hasher.finalize_into(GenericArray::from_mut_slice(&mut digest_a[..]));

    let mut tweaked = Zeroizing::new(*digest_a);
    if mode.is_long() {
        tweaked[SHA384_LEN - 1] %= 3;
    }

    let mut digest_b = Zeroizing::new([0u8; SHA1_LEN]);
    let mut hasher = Sha1::new();
    hasher.update(&tweaked[..]);
    hasher.finalize_into(GenericArray::from_mut_slice(&mut digest_b[..]));

    let offset = mode.slice_offset(digest_b[SHA1_LEN - 1]);
    let raw = &digest_a[offset..offset + mode.slice_len()];

    // Reserve the final size up front so inserts never reallocate and leave
    // stale copies of the password behind.
    let mut password = Zeroizing::new(String::with_capacity(
        mode.output_len() * char::MAX.len_utf8(),
    ));
    STANDARD_NO_PAD.encode_string(raw, &mut *password);

    let base_len = mode.base_len();
    for round in 0..mode.symbol_rounds() {
        let position = usize::from(digest_b[2 * round]) % (base_len + round);
        let symbol = symbols[usize::from(digest_b[2 * round + 1]) % symbols.len()];
        let at = char_to_byte_index(&password, position);
        password.insert(at, symbol);
    }

    Ok(std::mem::take(&mut *password))
}

/// Derive using the parameters stored in a preset.
pub fn derive_preset(master: &str, preset: &IdentifierPreset) -> Result<String, DeriveError> {
    derive(
        master,
        &preset.identifier,
        preset.iteration,
        &preset.symbols,
        PasswordMode::from_long_flag(preset.long_mode),
    )
}

/// Byte index of the `position`-th char, or the end of the string.
fn char_to_byte_index(text: &str, position: usize) -> usize {
    text.char_indices()
        .nth(position)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}
