//! Conversion between gene symbols and the identifier-safe feature names
//! stored inside fitted models.

/// Prefix marking a model feature derived from a gene symbol.
pub const FEATURE_PREFIX: &str = "gene_";

/// Encode a gene symbol as a model feature name.
///
/// Hyphens are not valid in feature identifiers and are replaced by
/// underscores, so `HLA-DRA` becomes `gene_HLA_DRA`. Underscores already in
/// the symbol are doubled (`CD45RA_TotalSeqB` becomes `gene_CD45RA__TotalSeqB`)
/// so decoding restores them exactly.
pub fn encode_feature_name(gene: &str) -> String {
    let mut feature = String::with_capacity(FEATURE_PREFIX.len() + gene.len() + 2);
    feature.push_str(FEATURE_PREFIX);
    for ch in gene.chars() {
        match ch {
            '_' => feature.push_str("__"),
            '-' => feature.push('_'),
            other => feature.push(other),
        }
    }
    feature
}

/// Recover the gene symbol from a model feature name.
///
/// Strips [`FEATURE_PREFIX`], turns each doubled underscore back into one
/// underscore and each single underscore into a hyphen. Names without the
/// prefix were not produced by [`encode_feature_name`] and are returned
/// unchanged.
pub fn decode_feature_name(feature: &str) -> String {
    let Some(rest) = feature.strip_prefix(FEATURE_PREFIX) else {
        return feature.to_string();
    };

    let mut gene = String::with_capacity(rest.len());
    let mut run = 0usize;
    for ch in rest.chars() {
        if ch == '_' {
            run += 1;
            continue;
        }
        push_underscore_run(&mut gene, run);
        run = 0;
        gene.push(ch);
    }
    push_underscore_run(&mut gene, run);
    gene
}

fn push_underscore_run(gene: &mut String, run: usize) {
    for _ in 0..run / 2 {
        gene.push('_');
    }
    if run % 2 == 1 {
        gene.push('-');
    }
}

/// Whether `gene` survives the feature-name encoding unchanged.
///
/// A hyphen next to an underscore (`A-_B`, `A_-B`) encodes to an ambiguous
/// run of underscores.
pub fn is_encodable(gene: &str) -> bool {
    !gene.contains("-_") && !gene.contains("_-")
}

pub fn encode_feature_names(genes: &[String]) -> Vec<String> {
    genes.iter().map(|g| encode_feature_name(g)).collect()
}

pub fn decode_feature_names(features: &[String]) -> Vec<String> {
    features.iter().map(|f| decode_feature_name(f)).collect()
}
