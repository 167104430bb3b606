//! Signature container size estimation.
//!
//! The placeholder is written before the signature exists and cannot
//! grow afterwards, so the estimate must always exceed the container
//! that phase two assembles.

/// Allowance for the SignedData skeleton, signer info, attributes and a
/// 4096-bit RSA signature.
pub const BASE_SIZE: usize = 8192;
/// Allowance for an OCSP response when an OCSP client is configured.
pub const OCSP_ALLOWANCE: usize = 4192;
/// Allowance for a timestamp token when a TSA is configured.
pub const TSA_ALLOWANCE: usize = 4600;
/// Per-blob DER framing overhead.
pub const ENTRY_OVERHEAD: usize = 10;

/// Estimated container size in bytes.
///
/// Additive in every input: there is no shortcut for configurations
/// without OCSP.
pub fn estimate(has_ocsp: bool, has_tsa: bool, crl_sizes: &[usize]) -> usize {
    let mut size = BASE_SIZE;
    if has_ocsp {
        size += OCSP_ALLOWANCE;
    }
    if has_tsa {
        size += TSA_ALLOWANCE;
    }
    size + crl_sizes.iter().map(|len| len + ENTRY_OVERHEAD).sum::<usize>()
}

/// Bytes to reserve for a session: the estimate plus room for every
/// embedded certificate and OCSP response.
pub fn reserved_size(
    has_ocsp: bool,
    has_tsa: bool,
    crl_sizes: &[usize],
    cert_sizes: &[usize],
    ocsp_sizes: &[usize],
) -> usize {
    let embedded: usize = cert_sizes
        .iter()
        .chain(ocsp_sizes)
        .map(|len| len + ENTRY_OVERHEAD)
        .sum();
    estimate(has_ocsp, has_tsa, crl_sizes) + embedded
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_estimate() {
        assert_eq!(estimate(false, false, &[]), 8192);
        assert_eq!(estimate(true, false, &[]), 12384);
        assert_eq!(estimate(false, true, &[]), 12792);
        assert_eq!(estimate(true, true, &[100, 200]), 8192 + 4192 + 4600 + 110 + 210);
    }

    #[test]
    fn test_tsa_only_is_not_collapsed() {
        assert!(estimate(false, true, &[]) > estimate(false, false, &[]));
    }

    #[test]
    fn test_reserved_size_adds_embedded_blobs() {
        assert_eq!(reserved_size(false, false, &[], &[1000, 900], &[]), 8192 + 1010 + 910);
        assert_eq!(reserved_size(true, false, &[], &[], &[50]), 12384 + 60);
    }

    proptest! {
        #[test]
        fn prop_estimate_is_monotonic(crls in prop::collection::vec(0usize..65536, 0..8), extra in 0usize..4096) {
            let base = estimate(false, false, &crls);
            let mut more = crls.clone();
            more.push(extra);
            prop_assert!(estimate(false, false, &more) > base);
            prop_assert!(estimate(true, true, &crls) > base);
        }
    }
}
