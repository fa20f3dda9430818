//! Media types attached to registered artifacts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media type of a produced file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Bam,
    Bai,
    Sam,
    Cram,
    Crai,
    Vcf,
    VcfGz,
    Bcf,
    Tbi,
    Bed,
    BedGraph,
    Fasta,
    Fai,
    Fastq,
    FastqGz,
    Gff,
    Text,
    Tsv,
    Csv,
    Json,
    Html,
    Pdf,
    Png,
    Binary,
}

impl MediaType {
    /// Guess from a file name; compound extensions checked first
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();

        let compound = [
            (".vcf.gz", MediaType::VcfGz),
            (".fastq.gz", MediaType::FastqGz),
            (".fq.gz", MediaType::FastqGz),
            (".vcf.gz.tbi", MediaType::Tbi),
            (".bam.bai", MediaType::Bai),
        ];
        // Longest suffix wins (".vcf.gz.tbi" before ".vcf.gz")
        let mut best: Option<(usize, MediaType)> = None;
        for (suffix, media) in compound {
            if name.ends_with(suffix) && best.is_none_or(|(len, _)| suffix.len() > len) {
                best = Some((suffix.len(), media));
            }
        }
        if let Some((_, media)) = best {
            return Some(media);
        }

        let ext = name.rsplit_once('.')?.1;
        let media = match ext {
            "bam" => MediaType::Bam,
            "bai" => MediaType::Bai,
            "sam" => MediaType::Sam,
            "cram" => MediaType::Cram,
            "crai" => MediaType::Crai,
            "vcf" => MediaType::Vcf,
            "bcf" => MediaType::Bcf,
            "tbi" => MediaType::Tbi,
            "bed" => MediaType::Bed,
            "bedgraph" | "bdg" => MediaType::BedGraph,
            "fa" | "fasta" | "fna" => MediaType::Fasta,
            "fai" => MediaType::Fai,
            "fq" | "fastq" => MediaType::Fastq,
            "gff" | "gff3" | "gtf" => MediaType::Gff,
            "txt" | "log" => MediaType::Text,
            "tsv" => MediaType::Tsv,
            "csv" => MediaType::Csv,
            "json" => MediaType::Json,
            "html" => MediaType::Html,
            "pdf" => MediaType::Pdf,
            "png" => MediaType::Png,
            _ => return None,
        };
        Some(media)
    }

    /// MIME-style identifier handed to the artifact catalog
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Bam => "application/x-bam",
            MediaType::Bai => "application/x-bam-index",
            MediaType::Sam => "text/x-sam",
            MediaType::Cram => "application/x-cram",
            MediaType::Crai => "application/x-cram-index",
            MediaType::Vcf => "text/x-vcf",
            MediaType::VcfGz => "application/x-vcf-gz",
            MediaType::Bcf => "application/x-bcf",
            MediaType::Tbi => "application/x-tabix-index",
            MediaType::Bed => "text/x-bed",
            MediaType::BedGraph => "text/x-bedgraph",
            MediaType::Fasta => "text/x-fasta",
            MediaType::Fai => "text/x-fasta-index",
            MediaType::Fastq => "text/x-fastq",
            MediaType::FastqGz => "application/x-fastq-gz",
            MediaType::Gff => "text/x-gff",
            MediaType::Text => "text/plain",
            MediaType::Tsv => "text/tab-separated-values",
            MediaType::Csv => "text/csv",
            MediaType::Json => "application/json",
            MediaType::Html => "text/html",
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Binary => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime())
    }
}
