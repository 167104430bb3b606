//! CMS `SignedData` container assembly.
//!
//! The container is detached (no encapsulated content), carries the
//! whole certificate chain and a single signer whose signature value is
//! the raw RSA output returned by the external signer.

use super::attributes::{ID_AA_TIMESTAMP_TOKEN, ID_DATA, ID_RSA_ENCRYPTION, ID_SHA256, ID_SIGNED_DATA};
use super::chain::CertificateChain;
use super::timestamp::TimestampClient;
use crate::error::{Error, Result};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use der::asn1::{Any, OctetString, SetOfVec};
use der::{Decode, Encode, Header, SliceReader};
use log::{debug, warn};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ID_SHA256,
        parameters: None,
    }
}

/// Assemble the DER `ContentInfo` wrapping the signed data.
pub fn build_container(
    chain: &CertificateChain,
    signed_attrs: SignedAttributes,
    signature: &[u8],
    timestamp_token: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let leaf = chain.leaf();
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: leaf.tbs_certificate.issuer.clone(),
        serial_number: leaf.tbs_certificate.serial_number.clone(),
    });

    let unsigned_attrs = match timestamp_token {
        Some(token) => Some(SetOfVec::try_from(vec![Attribute {
            oid: ID_AA_TIMESTAMP_TOKEN,
            values: SetOfVec::try_from(vec![Any::from_der(token)?])?,
        }])?),
        None => None,
    };

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid,
        digest_alg: sha256_algorithm(),
        signed_attrs: Some(signed_attrs),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: ID_RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        signature: OctetString::new(signature.to_vec())?,
        unsigned_attrs,
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![sha256_algorithm()])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: Some(certificate_set(chain)?),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };

    let container = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data)?,
    }
    .to_der()?;

    debug!(
        "Assembled {}-byte container ({} certificates, timestamp: {})",
        container.len(),
        chain.len(),
        timestamp_token.is_some()
    );
    Ok(container)
}

/// The chain as a DER set; a certificate repeated in the chain is kept once.
fn certificate_set(chain: &CertificateChain) -> Result<CertificateSet> {
    let mut seen: Vec<&[u8]> = Vec::with_capacity(chain.len());
    let mut choices = Vec::with_capacity(chain.len());
    for (cert, der) in chain.certificates().iter().zip(chain.der()) {
        if seen.contains(&der.as_slice()) {
            continue;
        }
        seen.push(der);
        choices.push(CertificateChoices::Certificate(cert.clone()));
    }
    Ok(CertificateSet(SetOfVec::try_from(choices)?))
}

/// Ask the authority for a token over SHA-256 of `signature`.
///
/// A failing or declining authority only costs the timestamp.
pub fn request_timestamp(tsa: Option<&dyn TimestampClient>, signature: &[u8]) -> Option<Vec<u8>> {
    let tsa = tsa?;
    let imprint = super::attributes::sha256(signature);
    match tsa.timestamp_token(&imprint) {
        Ok(Some(token)) => Some(token),
        Ok(None) => {
            warn!("Timestamp authority returned no token; signing without timestamp");
            None
        },
        Err(e) => {
            warn!("Timestamp authority failed ({}); signing without timestamp", e);
            None
        },
    }
}

/// Strip the zero padding that follows a container inside `/Contents`.
pub fn trim_container_padding(contents: &[u8]) -> Result<&[u8]> {
    let header = Header::decode(&mut SliceReader::new(contents)?)?;
    let total = usize::try_from((header.encoded_len()? + header.length)?)?;
    contents
        .get(..total)
        .ok_or_else(|| Error::Cms(format!("container claims {} bytes but only {} present", total, contents.len())))
}

/// Decode the signed data out of (possibly padded) `/Contents` bytes.
pub fn decode_container(contents: &[u8]) -> Result<SignedData> {
    let content_info = ContentInfo::from_der(trim_container_padding(contents)?)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Cms(format!(
            "content type {} is not signedData",
            content_info.content_type
        )));
    }
    Ok(content_info.content.decode_as::<SignedData>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::attributes::build_signed_attributes;
    use crate::signatures::timestamp::tests::fake_token;
    use chrono::{TimeZone, Utc};

    fn chain() -> CertificateChain {
        let pem = [
            include_str!("../../tests/fixtures/leaf.pem"),
            include_str!("../../tests/fixtures/intermediate.pem"),
            include_str!("../../tests/fixtures/root.pem"),
        ]
        .concat();
        CertificateChain::from_pem(pem.as_bytes()).unwrap()
    }

    fn attrs() -> SignedAttributes {
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        build_signed_attributes(&[9; 32], instant, None).unwrap()
    }

    #[test]
    fn test_container_structure() {
        let chain = chain();
        let der = build_container(&chain, attrs(), &[0x5A; 256], None).unwrap();
        let signed_data = decode_container(&der).unwrap();

        assert_eq!(signed_data.version, CmsVersion::V1);
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.certificates.unwrap().0.len(), 3);

        let signer = signed_data.signer_infos.0.iter().next().unwrap();
        assert_eq!(signer.signature.as_bytes(), &[0x5A; 256]);
        assert_eq!(signer.signature_algorithm.oid, ID_RSA_ENCRYPTION);
        assert_eq!(signer.signed_attrs.as_ref().unwrap(), &attrs());
        assert!(signer.unsigned_attrs.is_none());
        match &signer.sid {
            SignerIdentifier::IssuerAndSerialNumber(sid) => {
                assert_eq!(sid.serial_number, chain.leaf().tbs_certificate.serial_number);
            },
            other => panic!("unexpected signer identifier {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_token_is_unsigned_attribute() {
        let token = fake_token(&[1; 32]);
        let der = build_container(&chain(), attrs(), &[1; 256], Some(&token)).unwrap();
        let signed_data = decode_container(&der).unwrap();
        let signer = signed_data.signer_infos.0.iter().next().unwrap();
        let unsigned = signer.unsigned_attrs.as_ref().unwrap();
        let attr = unsigned.iter().next().unwrap();
        assert_eq!(attr.oid, ID_AA_TIMESTAMP_TOKEN);
        assert_eq!(attr.values.iter().next().unwrap().to_der().unwrap(), token);
    }

    #[test]
    fn test_duplicate_certificates_are_embedded_once() {
        let chain = chain();
        let mut der = chain.der().to_vec();
        der.push(der[0].clone());
        let doubled = CertificateChain::from_der(der).unwrap();
        let container = build_container(&doubled, attrs(), &[2; 256], None).unwrap();
        let signed_data = decode_container(&container).unwrap();
        assert_eq!(signed_data.certificates.unwrap().0.len(), 3);
    }

    #[test]
    fn test_trim_container_padding() {
        let der = build_container(&chain(), attrs(), &[3; 256], None).unwrap();
        let mut padded = der.clone();
        padded.extend_from_slice(&[0; 500]);
        assert_eq!(trim_container_padding(&padded).unwrap(), der.as_slice());
        assert!(trim_container_padding(&der[..der.len() - 1]).is_err());
        assert!(decode_container(&[0; 64]).is_err());
    }

    #[test]
    fn test_request_timestamp_failure_is_absorbed() {
        let failing = |_: &[u8]| -> Result<Option<Vec<u8>>> { Err(Error::Timestamp("down".to_string())) };
        assert_eq!(request_timestamp(Some(&failing), b"sig"), None);
        assert_eq!(request_timestamp(None, b"sig"), None);

        let granting = |imprint: &[u8]| -> Result<Option<Vec<u8>>> { Ok(Some(imprint.to_vec())) };
        let token = request_timestamp(Some(&granting), b"sig").unwrap();
        assert_eq!(token, crate::signatures::attributes::sha256(b"sig").to_vec());
    }
}
