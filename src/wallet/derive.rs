//! Key derivation and input normalization
//!
//! SECURITY: Every function here handles raw key material.
//! - Nothing is logged
//! - Errors never echo the rejected phrase or key

use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::Address;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};

/// BIP-44 path for the first Ethereum account
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Word count of freshly generated phrases
pub const GENERATED_WORD_COUNT: usize = 12;

/// Accepted phrase lengths
const ACCEPTED_WORD_COUNTS: [usize; 2] = [12, 24];

/// Generate a fresh random English mnemonic
pub fn generate_mnemonic() -> Result<String> {
    let mnemonic = bip39::Mnemonic::generate(GENERATED_WORD_COUNT)
        .map_err(|e| Error::Config(format!("Mnemonic generation failed: {}", e)))?;
    Ok(mnemonic.to_string())
}

/// Trim, lowercase and collapse whitespace
pub fn normalize_mnemonic(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a phrase and check its word count and checksum
pub fn validate_mnemonic(phrase: &str) -> Result<String> {
    let normalized = normalize_mnemonic(phrase);
    let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if !ACCEPTED_WORD_COUNTS.contains(&word_count) {
        return Err(Error::InvalidMnemonic);
    }

    bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &normalized)
        .map_err(|_| Error::InvalidMnemonic)?;

    Ok(normalized)
}

/// Canonical `0x`-prefixed lowercase form of a 32-byte hex key
pub fn normalize_private_key(key: &str) -> Result<String> {
    let trimmed = key.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 64 {
        return Err(Error::InvalidPrivateKey(format!(
            "expected 32 bytes (64 hex characters), got {} characters",
            digits.len()
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidPrivateKey(
            "key contains non-hex characters".to_string(),
        ));
    }

    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

/// Derive the signer at [`DERIVATION_PATH`] from a validated phrase
pub fn signer_from_mnemonic(phrase: &str) -> Result<PrivateKeySigner> {
    let normalized = validate_mnemonic(phrase)?;

    MnemonicBuilder::<English>::default()
        .phrase(normalized)
        .derivation_path(DERIVATION_PATH)
        .map_err(|_| Error::InvalidMnemonic)?
        .build()
        .map_err(|_| Error::InvalidMnemonic)
}

/// Build a signer from a hex private key (with or without prefix)
pub fn signer_from_private_key(key: &str) -> Result<PrivateKeySigner> {
    let normalized = normalize_private_key(key)?;
    normalized
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .map_err(|_| Error::InvalidPrivateKey("not a valid secp256k1 scalar".to_string()))
}

/// Lowercase `0x`-prefixed address
pub fn address_string(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Lowercase `0x`-prefixed private key of `signer`
pub fn private_key_string(signer: &PrivateKeySigner) -> String {
    format!("0x{}", hex::encode(signer.to_bytes().as_slice()))
}

/// Lowercased, trimmed form of a caller-supplied address for lookups
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development phrase (DO NOT use in production!)
    const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_known_vector() {
        let signer = signer_from_mnemonic(TEST_PHRASE).unwrap();
        assert_eq!(address_string(&signer.address()), TEST_ADDRESS);
        assert_eq!(private_key_string(&signer), TEST_KEY);
    }

    #[test]
    fn test_normalize_mnemonic() {
        assert_eq!(
            normalize_mnemonic("  Test\ttest \n TEST  junk "),
            "test test test junk"
        );
    }

    #[test]
    fn test_messy_phrase_derives_same_key() {
        let messy = "  TEST test   test test test test\ntest test test test test JUNK ";
        let signer = signer_from_mnemonic(messy).unwrap();
        assert_eq!(address_string(&signer.address()), TEST_ADDRESS);
    }

    #[test]
    fn test_generated_mnemonic_is_valid() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split(' ').count(), GENERATED_WORD_COUNT);
        assert_eq!(validate_mnemonic(&phrase).unwrap(), phrase);
    }

    #[test]
    fn test_rejects_bad_checksum_and_length() {
        // Valid words, wrong checksum word
        let bad_checksum = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(matches!(validate_mnemonic(bad_checksum), Err(Error::InvalidMnemonic)));

        let eleven = "test test test test test test test test test test junk";
        assert!(matches!(validate_mnemonic(eleven), Err(Error::InvalidMnemonic)));

        assert!(matches!(validate_mnemonic(""), Err(Error::InvalidMnemonic)));

        let not_words = "foo bar baz qux foo bar baz qux foo bar baz qux";
        assert!(matches!(validate_mnemonic(not_words), Err(Error::InvalidMnemonic)));
    }

    #[test]
    fn test_private_key_normalization() {
        let bare = TEST_KEY.trim_start_matches("0x").to_uppercase();
        assert_eq!(normalize_private_key(&format!("  {}  ", bare)).unwrap(), TEST_KEY);
        assert_eq!(normalize_private_key(TEST_KEY).unwrap(), TEST_KEY);

        let signer = signer_from_private_key(&bare).unwrap();
        assert_eq!(address_string(&signer.address()), TEST_ADDRESS);
    }

    #[test]
    fn test_rejects_wrong_length_keys() {
        let too_long = format!("{}00", TEST_KEY);
        for key in ["0x1234", "ab", "", too_long.as_str()] {
            assert!(matches!(
                normalize_private_key(key),
                Err(Error::InvalidPrivateKey(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_key() {
        let zero = format!("0x{}", "0".repeat(64));
        assert!(matches!(
            signer_from_private_key(&zero),
            Err(Error::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_errors_do_not_echo_key() {
        let bad = format!("0x{}zz", &TEST_KEY[2..64]);
        let err = normalize_private_key(&bad).unwrap_err();
        assert!(!err.to_string().contains("ac0974bec"));
    }
}
