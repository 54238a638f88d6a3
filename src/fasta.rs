//! Kraken header tagging over a streaming FASTA parser.
//!
//! Headers are handled as raw bytes so non-UTF-8 descriptions pass through
//! untouched. Sequence lines keep their original wrapping.

use std::io::{self, Read, Write};

use needletail::parser::{FastaReader, FastxReader, LineEnding, write_fasta};

use crate::domain::{TagMode, TaxId};

pub const KRAKEN_TAG: &str = "|kraken:taxid|";

/// `NC_000913.3 Escherichia coli` -> `NC_000913.3|kraken:taxid|562 Escherichia coli`
pub fn tag_header(header: &[u8], taxid: TaxId) -> Vec<u8> {
    let tag = format!("{KRAKEN_TAG}{taxid}");
    let split = header
        .iter()
        .position(|byte| matches!(byte, b' ' | b'\t'))
        .unwrap_or(header.len());
    let mut tagged = Vec::with_capacity(header.len() + tag.len());
    tagged.extend_from_slice(&header[..split]);
    tagged.extend_from_slice(tag.as_bytes());
    tagged.extend_from_slice(&header[split..]);
    tagged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagSummary {
    pub records: usize,
    pub tagged: usize,
}

fn invalid_data(err: impl ToString) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

/// Copies every record from `reader` to `writer`, tagging headers per `mode`.
/// An input without any record is rejected as invalid data.
pub fn tag_records<R, W>(
    reader: R,
    writer: &mut W,
    taxid: TaxId,
    mode: TagMode,
) -> io::Result<TagSummary>
where
    R: Read + Send,
    W: Write,
{
    let mut summary = TagSummary::default();
    let mut records = FastaReader::new(reader);
    while let Some(record) = records.next() {
        let record = record.map_err(invalid_data)?;
        let tag = match mode {
            TagMode::AllRecords => true,
            TagMode::FirstRecord => summary.records == 0,
        };
        let header = if tag {
            summary.tagged += 1;
            tag_header(record.id(), taxid)
        } else {
            record.id().to_vec()
        };
        write_fasta(&header, record.raw_seq(), writer, LineEnding::Unix).map_err(invalid_data)?;
        summary.records += 1;
    }
    if summary.records == 0 {
        return Err(invalid_data("no sequence records"));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_RECORDS: &str = ">NC_1.1 first plasmid\nACGT\nTTGA\n>NC_2.1 second\nGGCC\n";

    #[test]
    fn tag_header_inserts_after_identifier() {
        let taxid = TaxId::new(562);
        assert_eq!(
            tag_header(b"NC_000913.3 Escherichia coli", taxid),
            b"NC_000913.3|kraken:taxid|562 Escherichia coli"
        );
        assert_eq!(tag_header(b"NC_1.1", taxid), b"NC_1.1|kraken:taxid|562");
        assert_eq!(tag_header(b"NC_1.1\tx", taxid), b"NC_1.1|kraken:taxid|562\tx");
    }

    #[test]
    fn tags_every_record_by_default() {
        let mut out = Vec::new();
        let summary = tag_records(
            TWO_RECORDS.as_bytes(),
            &mut out,
            TaxId::new(7),
            TagMode::AllRecords,
        )
        .unwrap();
        assert_eq!(summary, TagSummary { records: 2, tagged: 2 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ">NC_1.1|kraken:taxid|7 first plasmid\nACGT\nTTGA\n>NC_2.1|kraken:taxid|7 second\nGGCC\n"
        );
    }

    #[test]
    fn first_record_mode_leaves_later_headers() {
        let mut out = Vec::new();
        let summary = tag_records(
            TWO_RECORDS.as_bytes(),
            &mut out,
            TaxId::new(7),
            TagMode::FirstRecord,
        )
        .unwrap();
        assert_eq!(summary.tagged, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(">NC_2.1 second\n"));
    }

    #[test]
    fn latin1_header_bytes_are_preserved() {
        let input: &[u8] = b">NC_1.1 Caf\xe9 strain\nACGT\n";
        let mut out = Vec::new();
        tag_records(input, &mut out, TaxId::new(1), TagMode::AllRecords).unwrap();
        assert_eq!(out, b">NC_1.1|kraken:taxid|1 Caf\xe9 strain\nACGT\n".to_vec());
    }

    #[test]
    fn rejects_non_fasta_input() {
        let mut out = Vec::new();
        let err = tag_records(
            "<html>not found</html>\n".as_bytes(),
            &mut out,
            TaxId::new(1),
            TagMode::AllRecords,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = tag_records("".as_bytes(), &mut out, TaxId::new(1), TagMode::AllRecords)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_final_newline_is_terminated() {
        let mut out = Vec::new();
        tag_records(">a\nAC".as_bytes(), &mut out, TaxId::new(3), TagMode::AllRecords).unwrap();
        assert_eq!(out, b">a|kraken:taxid|3\nAC\n");
    }
}
