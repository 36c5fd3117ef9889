use encoding_rs::{Encoding, UTF_8};

use killfeed_domain::SourceError;

/// Ordered fallback list of text encodings. The first one that decodes the
/// whole buffer without a malformed sequence wins.
#[derive(Debug, Clone)]
pub struct TextDecoder {
    encodings: Vec<&'static Encoding>,
}

impl TextDecoder {
    pub fn new(labels: &[String]) -> anyhow::Result<Self> {
        let mut encodings = Vec::with_capacity(labels.len());
        for label in labels {
            let encoding = Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| anyhow::anyhow!("unknown encoding label '{}'", label))?;
            if !encodings.contains(&encoding) {
                encodings.push(encoding);
            }
        }
        if encodings.is_empty() {
            encodings.push(UTF_8);
        }
        Ok(Self { encodings })
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.encodings.iter().map(|encoding| encoding.name()).collect()
    }

    /// Returns the text and the name of the encoding that produced it. A byte
    /// order mark overrides the fallback list.
    pub fn decode(&self, path: &str, bytes: &[u8]) -> Result<(String, &'static str), SourceError> {
        if bytes.is_empty() {
            return Ok((String::new(), self.encodings[0].name()));
        }
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            return encoding
                .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
                .map(|text| (text.into_owned(), encoding.name()))
                .ok_or_else(|| SourceError::Decode {
                    path: path.to_string(),
                    tried: encoding.name().to_string(),
                });
        }
        for encoding in &self.encodings {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                return Ok((text.into_owned(), encoding.name()));
            }
        }
        Err(SourceError::Decode {
            path: path.to_string(),
            tried: self.labels().join(", "),
        })
    }
}

/// Length of the prefix of `bytes` that ends with a newline. A UTF-16LE
/// newline (`0A 00`) keeps its trailing zero byte.
pub fn complete_line_len(bytes: &[u8]) -> usize {
    let Some(idx) = bytes.iter().rposition(|b| *b == b'\n') else {
        return 0;
    };
    if bytes.get(idx + 1) == Some(&0) && idx % 2 == 0 {
        idx + 2
    } else {
        idx + 1
    }
}
