//! Test helpers: scripted transports and handcrafted FITS tables.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::Result;
use crate::transport::{Credentials, TapTransport};

/// Transport that replays a fixed sequence of response bodies and records
/// everything the protocol code asked of it. `wait` records the requested
/// interval instead of sleeping, so poll-loop tests run instantly.
pub struct ScriptedTransport {
    responses: VecDeque<Vec<u8>>,
    pub forms: Vec<(String, Vec<(String, String)>)>,
    pub multiparts: Vec<(String, Vec<(String, String)>, String, Vec<u8>)>,
    pub gets: Vec<String>,
    pub waits: Vec<Duration>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            responses: responses.into(),
            forms: Vec::new(),
            multiparts: Vec::new(),
            gets: Vec::new(),
            waits: Vec::new(),
        }
    }

    fn next_response(&mut self) -> Vec<u8> {
        self.responses
            .pop_front()
            .expect("scripted transport ran out of responses")
    }
}

impl TapTransport for ScriptedTransport {
    fn post_form(
        &mut self,
        url: &str,
        _credentials: &Credentials,
        fields: &[(String, String)],
    ) -> Result<Vec<u8>> {
        self.forms.push((url.to_string(), fields.to_vec()));
        Ok(self.next_response())
    }

    fn post_multipart(
        &mut self,
        url: &str,
        _credentials: &Credentials,
        fields: &[(String, String)],
        part_name: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        self.multiparts.push((
            url.to_string(),
            fields.to_vec(),
            part_name.to_string(),
            payload,
        ));
        Ok(self.next_response())
    }

    fn get(&mut self, url: &str, _credentials: &Credentials) -> Result<Vec<u8>> {
        self.gets.push(url.to_string());
        Ok(self.next_response())
    }

    fn wait(&mut self, interval: Duration) {
        self.waits.push(interval);
    }
}

/// Build a FITS file whose first extension is a binary table of f64 columns,
/// the shape the query service returns.
pub fn fits_table(columns: &[(&str, &[f64])]) -> Vec<u8> {
    let n_rows = columns.first().map_or(0, |(_, v)| v.len());
    let row_bytes = columns.len() * 8;

    let mut out = Vec::new();

    // Primary HDU: no data.
    let mut primary = Vec::new();
    push_card(&mut primary, "SIMPLE", "T");
    push_card(&mut primary, "BITPIX", "8");
    push_card(&mut primary, "NAXIS", "0");
    push_card(&mut primary, "EXTEND", "T");
    push_end(&mut primary);
    out.extend_from_slice(&primary);

    // Binary table extension header.
    let mut header = Vec::new();
    push_string_card(&mut header, "XTENSION", "BINTABLE");
    push_card(&mut header, "BITPIX", "8");
    push_card(&mut header, "NAXIS", "2");
    push_card(&mut header, "NAXIS1", &row_bytes.to_string());
    push_card(&mut header, "NAXIS2", &n_rows.to_string());
    push_card(&mut header, "PCOUNT", "0");
    push_card(&mut header, "GCOUNT", "1");
    push_card(&mut header, "TFIELDS", &columns.len().to_string());
    for (i, (name, _)) in columns.iter().enumerate() {
        push_string_card(&mut header, &format!("TTYPE{}", i + 1), name);
        push_string_card(&mut header, &format!("TFORM{}", i + 1), "D");
    }
    push_end(&mut header);
    out.extend_from_slice(&header);

    // Row-major big-endian data, zero-padded to the block size.
    let mut data = Vec::with_capacity(n_rows * row_bytes);
    for row in 0..n_rows {
        for (_, values) in columns {
            data.extend_from_slice(&values[row].to_be_bytes());
        }
    }
    pad_block(&mut data, 0);
    out.extend_from_slice(&data);

    out
}

/// Fixed-format card: value right-justified so it ends at byte 30.
fn push_card(header: &mut Vec<u8>, key: &str, value: &str) {
    let card = format!("{:<8}= {:>20}", key, value);
    push_padded(header, &card);
}

/// String card: quoted value, padded to the FITS minimum of 8 characters.
fn push_string_card(header: &mut Vec<u8>, key: &str, value: &str) {
    let card = format!("{:<8}= '{:<8}'", key, value);
    push_padded(header, &card);
}

fn push_end(header: &mut Vec<u8>) {
    push_padded(header, "END");
    pad_block(header, b' ');
}

fn push_padded(header: &mut Vec<u8>, card: &str) {
    let mut bytes = card.as_bytes().to_vec();
    bytes.resize(80, b' ');
    header.extend_from_slice(&bytes);
}

/// Pad to the 2880-byte FITS block boundary.
fn pad_block(block: &mut Vec<u8>, fill: u8) {
    while block.len() % 2880 != 0 {
        block.push(fill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_output_is_block_aligned() {
        let bytes = fits_table(&[("RA", &[1.0, 2.0]), ("DEC", &[3.0, 4.0])]);
        assert_eq!(bytes.len() % 2880, 0);
        // Primary block + extension header block + one data block.
        assert_eq!(bytes.len(), 3 * 2880);
    }

    #[test]
    fn cards_are_eighty_bytes() {
        let mut header = Vec::new();
        push_card(&mut header, "NAXIS1", "16");
        assert_eq!(header.len(), 80);
        assert!(header.starts_with(b"NAXIS1  = "));
    }

    #[test]
    fn scripted_transport_replays_in_order() {
        let mut transport = ScriptedTransport::new(vec![b"one".to_vec(), b"two".to_vec()]);
        let creds = Credentials::anonymous();
        assert_eq!(transport.get("a", &creds).unwrap(), b"one");
        assert_eq!(transport.get("b", &creds).unwrap(), b"two");
        assert_eq!(transport.gets, vec!["a".to_string(), "b".to_string()]);
    }
}
