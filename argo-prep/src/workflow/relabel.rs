//! Clinical table relabeling for the downstream training tool

use crate::error::PipelineResult;
use argo_common::config::RelabelConfig;
use argo_common::ClinicalTable;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<stem>_<suffix>.csv` next to the input
pub fn default_relabel_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clinical_table".to_string());
    input.with_file_name(format!("{}_{}.csv", stem, suffix))
}

/// Rewrite `input`'s status labels; returns the output path
pub fn run_relabel(
    input: &Path,
    output: Option<&Path>,
    settings: &RelabelConfig,
) -> PipelineResult<PathBuf> {
    let clinical = ClinicalTable::read_csv(input)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_relabel_output(input, &settings.output_suffix));
    let labels = settings.label_set();

    clinical.write_csv_with_labels(&output, &labels)?;
    info!(
        "Relabeled {} patients ({} / {}) to {}",
        clinical.len(),
        labels.msi_high,
        labels.stable,
        output.display()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_name() {
        let input = Path::new("tables/2/all_clinical_table.csv");
        assert_eq!(
            default_relabel_output(input, &RelabelConfig::default().output_suffix),
            PathBuf::from("tables/2/all_clinical_table_histobistro.csv")
        );
        assert_eq!(
            default_relabel_output(input, "binary"),
            PathBuf::from("tables/2/all_clinical_table_binary.csv")
        );
    }

    #[test]
    fn test_relabel_rewrites_status_only() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("all_clinical_table.csv");
        fs::write(&input, "PATIENT,isMSIH,batch_number\nP1,MSI-H,1\nP2,MSS,3\nP3,,3\n").unwrap();

        let output = run_relabel(&input, None, &RelabelConfig::default()).unwrap();
        assert_eq!(output, dir.path().join("all_clinical_table_histobistro.csv"));
        let written = fs::read_to_string(output).unwrap();
        assert_eq!(
            written,
            "PATIENT,isMSIH,batch_number\nP1,MSIH,1\nP2,nonMSIH,3\nP3,,3\n"
        );
    }
}
