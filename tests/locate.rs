use std::fs;
use std::io::Write;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use kraken_refseq::domain::TaxId;
use kraken_refseq::error::RefseqError;
use kraken_refseq::manifest::read_manifest;
use kraken_refseq::taxa::{load_taxids, locate};

fn line(accession: &str, taxid: &str, status: &str, level: &str, dir: &str) -> String {
    let path = format!("ftp://ftp.ncbi.nlm.nih.gov/genomes/all/{dir}");
    let mut fields = vec!["na"; 21];
    fields[0] = accession;
    fields[5] = taxid;
    fields[10] = status;
    fields[11] = level;
    fields[19] = path.as_str();
    fields.join("\t")
}

#[test]
fn locate_lists_every_status_from_gzipped_manifest() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = temp.path().join("assembly_summary.txt.gz");
    let text = [
        "# assembly_accession\tbioproject".to_string(),
        line("GCF_1.1", "562", "latest", "Complete Genome", "GCF_1.1_A"),
        line("GCF_1.2", "562", "replaced", "Chromosome", "GCF_1.2_A"),
        line("GCF_9.1", "9", "latest", "Contig", "GCF_9.1_Z"),
    ]
    .join("\n");
    let mut encoder = GzEncoder::new(fs::File::create(&manifest).unwrap(), Compression::fast());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let taxids = temp.path().join("taxa.tsv");
    fs::write(&taxids, "562\tEscherichia coli\n7\tunknown\n").unwrap();

    let records = read_manifest(&manifest, None).unwrap().records;
    let ids = load_taxids(&taxids).unwrap();
    assert_eq!(ids, vec![TaxId::new(562), TaxId::new(7)]);

    let rows = locate(&records, &ids)
        .iter()
        .map(|row| row.to_tsv())
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            "562\tComplete Genome\tlatest\tGCF_1.1_A_genomic.tax.fna",
            "562\tChromosome\treplaced\tGCF_1.2_A_genomic.tax.fna",
            "7\tn/a\tn/a\tn/a",
        ]
    );
}

#[test]
fn unreadable_taxid_file() {
    let temp = tempfile::tempdir().unwrap();
    assert_matches!(
        load_taxids(&temp.path().join("missing.txt")),
        Err(RefseqError::TaxIdFileRead { .. })
    );
}
