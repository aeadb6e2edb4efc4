//! Pure parsing functions that turn the three schedule-input file formats
//! into the normalized record shapes the Schedule Store persists. Every
//! adapter here is side-effect-free: no disk access, no store handle.
//! Malformed records are skipped and counted in a [`model::ParseReport`]
//! rather than aborting the parse, per the Schedule Store's import contract.

pub mod alf;
pub mod cif;
pub mod msn;

use model::FileType;

/// Guesses which of the three formats `bytes` holds, from its leading
/// content rather than any filename — extracts arrive over a file-drop
/// directory where the suffix convention isn't always honoured. Falls back
/// to `None` when nothing recognizable appears in the first non-blank line.
pub fn sniff_file_kind(bytes: &[u8]) -> Option<FileType> {
    let text = String::from_utf8_lossy(bytes);
    let first_line = text.lines().find(|line| !line.trim().is_empty())?;

    if first_line.len() >= 2 && matches!(&first_line[0..2], "HD" | "TI" | "BS" | "BX") {
        return Some(FileType::Cif);
    }
    if first_line.starts_with('A') && first_line.len() >= 20 {
        return Some(FileType::Msn);
    }
    if first_line.contains('=') && first_line.to_ascii_uppercase().contains("TIPLOC") {
        return Some(FileType::Alf);
    }
    // Legacy fixed-width ALF has no distinguishing header; seven-character
    // TIPLOC pairs back to back are its best tell.
    if first_line.len() >= 14
        && first_line[0..7].chars().all(|c| c.is_ascii_alphanumeric())
        && first_line[7..14].chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Some(FileType::Alf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_cif_header() {
        assert_eq!(
            sniff_file_kind(b"HDTPS.UDFROC1.PD231124           130524"),
            Some(FileType::Cif)
        );
    }

    #[test]
    fn sniffs_key_value_alf() {
        assert_eq!(
            sniff_file_kind(b"TIPLOC1=EUSTON;TIPLOC2=KNGX;MODE=walk;DURATION=15"),
            Some(FileType::Alf)
        );
    }

    #[test]
    fn returns_none_for_unrecognized_content() {
        assert_eq!(sniff_file_kind(b"just some unrelated text\n"), None);
    }
}
