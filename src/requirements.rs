//! Environment checks behind `--check-requirements`.

use std::path::Path;

/// Everything that would stop a print from working on this machine.
///
/// An empty list means ready to print.
pub async fn check(font: Option<&Path>) -> Vec<String> {
    let mut issues = Vec::new();

    bluetooth_issues(&mut issues).await;

    if let Some(font) = font {
        if let Err(e) = std::fs::File::open(font) {
            issues.push(format!("font {} is not readable: {}", font.display(), e));
        }
    }

    issues
}

#[cfg(feature = "bluetooth")]
async fn bluetooth_issues(issues: &mut Vec<String>) {
    if let Err(e) = crate::transport::btle::BtleAdapter::first().await {
        issues.push(format!("no usable Bluetooth adapter: {}", e));
    }
}

#[cfg(not(feature = "bluetooth"))]
async fn bluetooth_issues(issues: &mut Vec<String>) {
    issues.push(
        "bluetooth support not compiled in (rebuild with `--features bluetooth`)".to_string(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "bluetooth"))]
    #[tokio::test]
    async fn test_reports_missing_backend() {
        let issues = check(None).await;
        assert!(issues.iter().any(|i| i.contains("not compiled in")));
    }

    #[tokio::test]
    async fn test_reports_unreadable_font() {
        let issues = check(Some(Path::new("/nonexistent/font.ttf"))).await;
        assert!(issues.iter().any(|i| i.contains("font")));
    }
}
