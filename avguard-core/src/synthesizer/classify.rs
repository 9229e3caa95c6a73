use avguard_model::{RawScanSnapshot, ScanEntry, ScanState, ScannerStatus};

/// Reduce a raw scanner snapshot to the state observers render.
///
/// Total over every input: status ids this build does not recognise are
/// treated like an idle scanner, so only their infected entries matter.
pub fn classify(snapshot: Option<&RawScanSnapshot>) -> ScanState {
    let Some(snapshot) = snapshot else {
        return ScanState::Empty;
    };

    match snapshot.status() {
        Some(status @ (ScannerStatus::Scanning | ScannerStatus::Paused)) => {
            ScanState::Running {
                entries: snapshot
                    .entries
                    .iter()
                    .map(|entry| ScanEntry::new(entry.path.clone(), entry.status()))
                    .collect(),
                is_paused: status == ScannerStatus::Paused,
            }
        }
        _ => {
            let viruses: Vec<String> = snapshot
                .entries
                .iter()
                .filter(|entry| entry.status().is_infected())
                .map(|entry| entry.path.clone())
                .collect();

            if viruses.is_empty() {
                ScanState::Empty
            } else {
                ScanState::VirusesDetected { viruses }
            }
        }
    }
}
